use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use loadladder_core::config::LadderConfig;
use loadladder_core::engine::LadderOutcome;
use loadladder_core::results::export::{aggregate_csv, markdown_report, samples_csv, ReportContext};
use loadladder_core::LadderError;

pub const AGGREGATE_FILE: &str = "aggregate_results.csv";
pub const REPORT_FILE: &str = "ANALYSIS_REPORT.md";
pub const SUMMARIES_FILE: &str = "summaries.json";

pub fn samples_file_name(users: u32) -> String {
    format!("results_{users}users.csv")
}

/// Write every report of a finished ladder into `dir` and return the paths
/// written, in order.
pub async fn write_reports(
    dir: &Path,
    config: &LadderConfig,
    outcome: &LadderOutcome,
    generated_at: DateTime<Utc>,
) -> Result<Vec<PathBuf>, LadderError> {
    tokio::fs::create_dir_all(dir).await?;
    let base_url = config.base_url();
    let mut written = Vec::new();

    for record in &outcome.scenarios {
        let path = dir.join(samples_file_name(record.result.concurrency));
        let csv = samples_csv(&record.result.samples)?;
        tokio::fs::write(&path, csv).await?;
        written.push(path);
    }

    let summaries = outcome.summaries();
    let interrupted = outcome.interrupted_levels();

    let path = dir.join(AGGREGATE_FILE);
    tokio::fs::write(&path, aggregate_csv(&summaries)?).await?;
    written.push(path);

    let path = dir.join(SUMMARIES_FILE);
    let json = serde_json::to_string_pretty(&serde_json::json!({
        "base_url": base_url,
        "duration_secs": config.duration_secs,
        "cancelled": outcome.cancelled,
        "interrupted_levels": interrupted,
        "trend": outcome.trend,
        "summaries": summaries,
    }))?;
    tokio::fs::write(&path, json).await?;
    written.push(path);

    let report = markdown_report(&ReportContext {
        generated_at,
        base_url: &base_url,
        duration_secs: config.duration_secs,
        summaries: &summaries,
        trend: outcome.trend,
        cancelled: outcome.cancelled,
        interrupted: &interrupted,
    });
    let path = dir.join(REPORT_FILE);
    tokio::fs::write(&path, report).await?;
    written.push(path);

    tracing::debug!(files = written.len(), dir = %dir.display(), "reports written");
    Ok(written)
}
