use chrono::{DateTime, Utc};

use super::{Sample, Summary};
use crate::engine::ScalingTrend;
use crate::error::LadderError;

/// Error rate (%) above which the report flags instability.
pub const HIGH_ERROR_RATE_PERCENT: f64 = 5.0;
/// Average response time (ms) above which the report flags slowness.
pub const SLOW_RESPONSE_MS: f64 = 1000.0;
/// Error rate (%) at or below which the all-clear may be given.
pub const HEALTHY_ERROR_RATE_PERCENT: f64 = 1.0;
/// Average response time (ms) below which the all-clear may be given.
pub const HEALTHY_RESPONSE_MS: f64 = 500.0;

// Placeholder values for JMeter columns this engine does not track.
const RESPONSE_MESSAGE: &str = "OK";
const DATA_TYPE: &str = "text";
const SENT_BYTES: u64 = 500;
const GROUP_THREADS: u32 = 1;
const ALL_THREADS: u32 = 1;
const IDLE_TIME: u64 = 0;
const CONNECT_MS: u64 = 10;

// ---------------------------------------------------------------------------
// CSV export
// ---------------------------------------------------------------------------

/// Export the raw samples of one scenario in JMeter result-file layout.
pub fn samples_csv(samples: &[Sample]) -> Result<String, LadderError> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record([
        "timeStamp",
        "elapsed",
        "label",
        "responseCode",
        "responseMessage",
        "threadName",
        "dataType",
        "success",
        "failureMessage",
        "bytes",
        "sentBytes",
        "grpThreads",
        "allThreads",
        "URL",
        "Latency",
        "IdleTime",
        "Connect",
    ])?;

    for s in samples {
        wtr.write_record([
            s.issued_at_ms().to_string(),
            s.elapsed_ms.to_string(),
            s.label.clone(),
            s.status_code.to_string(),
            RESPONSE_MESSAGE.to_string(),
            s.thread_name(),
            DATA_TYPE.to_string(),
            s.success.to_string(),
            String::new(),
            s.bytes_received.to_string(),
            SENT_BYTES.to_string(),
            GROUP_THREADS.to_string(),
            ALL_THREADS.to_string(),
            s.url.clone(),
            s.elapsed_ms.to_string(),
            IDLE_TIME.to_string(),
            CONNECT_MS.to_string(),
        ])?;
    }

    finish(wtr)
}

/// Export one row of statistics per scenario.
pub fn aggregate_csv(summaries: &[Summary]) -> Result<String, LadderError> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record([
        "Users",
        "AvgResponseTime",
        "MinResponseTime",
        "MaxResponseTime",
        "MedianResponseTime",
        "P90",
        "P95",
        "P99",
        "StdDeviation",
        "ErrorRate",
        "Throughput",
        "Samples",
    ])?;

    for s in summaries {
        wtr.write_record([
            s.concurrency.to_string(),
            format!("{:.2}", s.avg_ms),
            s.min_ms.to_string(),
            s.max_ms.to_string(),
            format!("{:.2}", s.median_ms),
            format!("{:.2}", s.p90_ms as f64),
            format!("{:.2}", s.p95_ms as f64),
            format!("{:.2}", s.p99_ms as f64),
            format!("{:.2}", s.std_dev_ms),
            format!("{:.2}", s.error_rate_percent),
            format!("{:.2}", s.throughput_per_sec),
            s.sample_count.to_string(),
        ])?;
    }

    finish(wtr)
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String, LadderError> {
    let bytes = wtr
        .into_inner()
        .map_err(|e| LadderError::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| LadderError::Internal(format!("CSV is not UTF-8: {e}")))
}

// ---------------------------------------------------------------------------
// Markdown report
// ---------------------------------------------------------------------------

/// Inputs of the narrative analysis report.
pub struct ReportContext<'a> {
    pub generated_at: DateTime<Utc>,
    pub base_url: &'a str,
    pub duration_secs: u64,
    pub summaries: &'a [Summary],
    pub trend: ScalingTrend,
    /// The run was stopped before every planned scenario finished.
    pub cancelled: bool,
    /// User levels whose scenario was cut short.
    pub interrupted: &'a [u32],
}

/// Render the Markdown analysis report: summary table, scaling analysis and
/// threshold-driven recommendations.
pub fn markdown_report(ctx: &ReportContext<'_>) -> String {
    let mut out = String::new();

    out.push_str("# API Load Test Report\n\n");
    out.push_str(&format!(
        "**Generated:** {}\n\n",
        ctx.generated_at.format("%Y-%m-%d %H:%M:%S")
    ));
    out.push_str(&format!("**API Endpoint:** {}\n\n", ctx.base_url));
    out.push_str(&format!(
        "**Test Duration:** {} seconds per scenario\n\n",
        ctx.duration_secs
    ));

    let simulated: Vec<String> = ctx
        .summaries
        .iter()
        .filter(|s| s.provenance.is_simulated())
        .map(|s| s.concurrency.to_string())
        .collect();
    if !simulated.is_empty() {
        out.push_str(&format!(
            "**Data Source:** simulated results for {} user scenario(s): {}. \
             These figures were not measured against the API.\n\n",
            simulated.len(),
            simulated.join(", ")
        ));
    }

    if ctx.cancelled {
        out.push_str(&run_status(ctx.interrupted));
    }

    out.push_str("## Summary\n\n");
    out.push_str("| Users | Avg (ms) | Min (ms) | Max (ms) | P95 (ms) | Error % | Throughput |\n");
    out.push_str("|-------|----------|----------|----------|----------|---------|------------|\n");
    for s in ctx.summaries {
        let users = if ctx.interrupted.contains(&s.concurrency) {
            format!("{} (interrupted)", s.concurrency)
        } else {
            s.concurrency.to_string()
        };
        out.push_str(&format!(
            "| {} | {:.2} | {} | {} | {:.2} | {:.2}% | {:.2} req/s |\n",
            users,
            s.avg_ms,
            s.min_ms,
            s.max_ms,
            s.p95_ms as f64,
            s.error_rate_percent,
            s.throughput_per_sec
        ));
    }

    out.push_str("\n## Analysis\n\n");
    out.push_str(&format!("**Response Time Scaling:** {}\n\n", ctx.trend));

    out.push_str("## Recommendations\n\n");
    out.push_str(&recommendations(ctx.summaries, &ctx.trend));

    out
}

fn run_status(interrupted: &[u32]) -> String {
    if interrupted.is_empty() {
        return "**Run Status:** cancelled before every planned scenario ran.\n\n".to_string();
    }
    let levels: Vec<String> = interrupted.iter().map(u32::to_string).collect();
    format!(
        "**Run Status:** cancelled. Interrupted scenario(s): {} users. \
         Their throughput covers only the time they ran, and they are \
         excluded from the scaling analysis.\n\n",
        levels.join(", ")
    )
}

fn recommendations(summaries: &[Summary], trend: &ScalingTrend) -> String {
    let mut out = String::new();
    if summaries.is_empty() {
        return out;
    }

    let max_error = summaries
        .iter()
        .map(|s| s.error_rate_percent)
        .fold(f64::MIN, f64::max);
    let max_response = summaries.iter().map(|s| s.avg_ms).fold(f64::MIN, f64::max);

    if max_error > HIGH_ERROR_RATE_PERCENT {
        out.push_str("- ⚠️ High error rate detected at higher loads. Consider:\n");
        out.push_str("  - Increasing connection pool sizes\n");
        out.push_str("  - Adding database query optimization\n");
        out.push_str("  - Implementing request rate limiting\n\n");
    }

    if max_response > SLOW_RESPONSE_MS {
        out.push_str("- ⚠️ Response times exceed 1 second at peak load. Consider:\n");
        out.push_str("  - Adding a caching layer\n");
        out.push_str("  - Optimizing database queries with indexes\n");
        out.push_str("  - Implementing pagination for large result sets\n\n");
    }

    if trend.is_super_linear() {
        out.push_str("- ⚠️ Super-linear scaling detected. Consider:\n");
        out.push_str("  - Reviewing lock contention in code\n");
        out.push_str("  - Adding horizontal scaling capabilities\n");
        out.push_str("  - Implementing async processing where possible\n\n");
    }

    if max_error <= HEALTHY_ERROR_RATE_PERCENT && max_response < HEALTHY_RESPONSE_MS {
        out.push_str("- ✅ API performs well under tested loads\n");
        out.push_str("- Consider testing with higher user counts if needed\n\n");
    }

    out
}

// ---------------------------------------------------------------------------
// Console summary
// ---------------------------------------------------------------------------

/// Multi-line, human-readable block describing one scenario.
pub fn format_summary(s: &Summary) -> String {
    let mut out = String::new();
    out.push_str(&format!("Results for {} users", s.concurrency));
    if s.provenance.is_simulated() {
        out.push_str(" (simulated)");
    }
    out.push_str(":\n");
    out.push_str(&format!("  Samples: {}\n", s.sample_count));
    out.push_str(&format!("  Avg Response Time: {:.2} ms\n", s.avg_ms));
    out.push_str(&format!("  Min Response Time: {} ms\n", s.min_ms));
    out.push_str(&format!("  Max Response Time: {} ms\n", s.max_ms));
    out.push_str(&format!("  Median: {:.2} ms\n", s.median_ms));
    out.push_str(&format!("  90th Percentile: {} ms\n", s.p90_ms));
    out.push_str(&format!("  95th Percentile: {} ms\n", s.p95_ms));
    out.push_str(&format!("  99th Percentile: {} ms\n", s.p99_ms));
    out.push_str(&format!("  Std Deviation: {:.2} ms\n", s.std_dev_ms));
    out.push_str(&format!("  Error Rate: {:.2}%\n", s.error_rate_percent));
    out.push_str(&format!("  Throughput: {:.2} req/s\n", s.throughput_per_sec));
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
