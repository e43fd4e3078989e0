pub mod export;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Provenance
// ---------------------------------------------------------------------------

/// Where the samples of a scenario came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Samples measured against a live HTTP endpoint.
    #[default]
    Network,
    /// Samples produced by the synthetic generator.
    Simulated,
}

impl Provenance {
    pub fn is_simulated(self) -> bool {
        self == Provenance::Simulated
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Provenance::Network => "network",
            Provenance::Simulated => "simulated",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Sample
// ---------------------------------------------------------------------------

/// One measured request attempt. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Sample {
    /// Wall-clock time at which the request was dispatched.
    pub issued_at: DateTime<Utc>,
    /// Time from dispatch to completion or failure, in whole milliseconds.
    pub elapsed_ms: u64,
    /// `GET <last path segment>`; identical for every request to the same endpoint.
    pub label: String,
    /// HTTP status, or `0` when the request failed below HTTP.
    pub status_code: u16,
    /// `true` iff `status_code == 200`.
    pub success: bool,
    /// Originating worker. Diagnostic only.
    pub worker_id: u32,
    /// Response body size; `0` on transport failure.
    pub bytes_received: u64,
    /// The resolved URL that was requested.
    pub url: String,
}

impl Sample {
    /// Build a sample for a request that produced an HTTP response.
    pub fn response(
        issued_at: DateTime<Utc>,
        elapsed_ms: u64,
        endpoint: &str,
        url: String,
        worker_id: u32,
        status_code: u16,
        bytes_received: u64,
    ) -> Self {
        Self {
            issued_at,
            elapsed_ms,
            label: label_for(endpoint),
            status_code,
            success: status_code == 200,
            worker_id,
            bytes_received,
            url,
        }
    }

    /// Build a sample for a request that never produced a response.
    pub fn transport_failure(
        issued_at: DateTime<Utc>,
        elapsed_ms: u64,
        endpoint: &str,
        url: String,
        worker_id: u32,
    ) -> Self {
        Self {
            issued_at,
            elapsed_ms,
            label: label_for(endpoint),
            status_code: 0,
            success: false,
            worker_id,
            bytes_received: 0,
            url,
        }
    }

    /// Thread-style name used in exported sample files.
    pub fn thread_name(&self) -> String {
        format!("Worker-{}", self.worker_id)
    }

    /// Dispatch time as milliseconds since the Unix epoch.
    pub fn issued_at_ms(&self) -> i64 {
        self.issued_at.timestamp_millis()
    }
}

/// Derive the sample label from an endpoint path.
///
/// Uses the final non-empty path segment, so `/api/v1/Field/index` and
/// `/api/v1/Field/index/` both map to `GET index`.
pub fn label_for(endpoint: &str) -> String {
    let segment = endpoint
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    format!("GET {segment}")
}

/// Convert a measured duration to whole milliseconds, truncating.
///
/// Sub-millisecond durations are reported as `1` so that a request which
/// was actually dispatched never shows up as taking `0` ms.
pub fn elapsed_millis(elapsed: Duration) -> u64 {
    if elapsed.is_zero() {
        return 0;
    }
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX).max(1)
}

// ---------------------------------------------------------------------------
// ScenarioResult
// ---------------------------------------------------------------------------

/// Every sample produced during one scenario, frozen once the run returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScenarioResult {
    pub run_id: Uuid,
    /// Number of concurrent workers used.
    pub concurrency: u32,
    /// Nominal scenario duration.
    pub duration: Duration,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub provenance: Provenance,
    /// Workers that stopped on an internal fault rather than their budget.
    pub worker_failures: u32,
    /// Cancellation cut the scenario short of its nominal duration.
    #[serde(default)]
    pub interrupted: bool,
    pub samples: Vec<Sample>,
}

impl ScenarioResult {
    /// Reduce this scenario to its [`Summary`] over the nominal duration.
    pub fn summarize(&self) -> Summary {
        self.summarize_over(self.duration)
    }

    /// Reduce this scenario with throughput computed over `duration`.
    pub fn summarize_over(&self, duration: Duration) -> Summary {
        crate::engine::aggregator::summarize(
            &self.samples,
            self.concurrency,
            duration,
            self.provenance,
        )
    }

    /// Wall-clock time between start and finish, capped at the nominal
    /// duration.
    pub fn wall_time(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .map_or(Duration::ZERO, |elapsed| elapsed.min(self.duration))
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Reduced statistics for one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Summary {
    pub concurrency: u32,
    pub sample_count: u64,
    pub avg_ms: f64,
    pub min_ms: u64,
    pub max_ms: u64,
    pub median_ms: f64,
    pub p90_ms: u64,
    pub p95_ms: u64,
    pub p99_ms: u64,
    /// Sample standard deviation (n - 1 denominator).
    pub std_dev_ms: f64,
    pub error_rate_percent: f64,
    /// Samples per second of nominal scenario duration.
    pub throughput_per_sec: f64,
    pub duration_sec: f64,
    pub provenance: Provenance,
}

impl Summary {
    /// The summary of a scenario that produced no samples.
    pub fn empty(concurrency: u32, duration_sec: f64, provenance: Provenance) -> Self {
        Self {
            concurrency,
            sample_count: 0,
            avg_ms: 0.0,
            min_ms: 0,
            max_ms: 0,
            median_ms: 0.0,
            p90_ms: 0,
            p95_ms: 0,
            p99_ms: 0,
            std_dev_ms: 0.0,
            error_rate_percent: 0.0,
            throughput_per_sec: 0.0,
            duration_sec,
            provenance,
        }
    }
}
