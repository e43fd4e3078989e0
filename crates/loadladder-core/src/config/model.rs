use std::time::Duration;

use serde::{Deserialize, Serialize};

/// User-load ladder used for a full run.
pub const DEFAULT_USER_LOADS: [u32; 6] = [1, 5, 20, 50, 100, 300];
/// Shorter ladder used by [`LadderConfig::quick`].
pub const QUICK_USER_LOADS: [u32; 4] = [1, 5, 20, 50];
pub const QUICK_DURATION_SECS: u64 = 30;
/// Longest scenario accepted by validation: one day.
pub const MAX_DURATION_SECS: u64 = 24 * 60 * 60;

/// Read-only list endpoints exercised by default.
pub const DEFAULT_ENDPOINTS: [&str; 5] = [
    "/api/v1/Resources",
    "/api/v1/Workers",
    "/api/v1/Field/index",
    "/api/v1/Machines",
    "/api/v1/Warehouses",
];

// ---------------------------------------------------------------------------
// FallbackPolicy
// ---------------------------------------------------------------------------

/// When the simulated generator replaces real network load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Only when the HTTP client cannot be built at all.
    Never,
    /// Also when the availability probe fails.
    #[default]
    WhenUnreachable,
    /// Always simulate; no network traffic is generated.
    Always,
}

// ---------------------------------------------------------------------------
// LadderConfig
// ---------------------------------------------------------------------------

/// Everything needed to run one ladder of load scenarios.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct LadderConfig {
    pub host: String,
    pub port: u16,
    pub protocol: String,
    /// Nominal duration of each scenario.
    pub duration_secs: u64,
    /// Concurrency levels, run in this order.
    pub user_loads: Vec<u32>,
    /// Paths appended to the base URL; each worker cycles through them.
    pub endpoints: Vec<String>,
    pub request_timeout_secs: u64,
    /// Idle keep-alive connections kept per host in the shared pool.
    pub pool_max_idle_per_host: usize,
    /// Pause after every request inside a worker.
    pub inter_request_pause_ms: u64,
    /// Pause between consecutive scenarios.
    pub cool_down_secs: u64,
    pub probe_timeout_secs: u64,
    /// Skip TLS certificate validation for load requests and the probe.
    pub accept_invalid_certs: bool,
    pub fallback: FallbackPolicy,
    /// Seed for the simulated generator.
    pub simulation_seed: u64,
    pub results_dir: String,
}

impl Default for LadderConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5000,
            protocol: "http".to_string(),
            duration_secs: 60,
            user_loads: DEFAULT_USER_LOADS.to_vec(),
            endpoints: DEFAULT_ENDPOINTS.iter().map(|e| e.to_string()).collect(),
            request_timeout_secs: 30,
            pool_max_idle_per_host: 300,
            inter_request_pause_ms: 100,
            cool_down_secs: 2,
            probe_timeout_secs: 5,
            accept_invalid_certs: true,
            fallback: FallbackPolicy::default(),
            simulation_seed: 0x5eed,
            results_dir: "load-test-results".to_string(),
        }
    }
}

impl LadderConfig {
    /// Switch to the quick ladder: 30 seconds per scenario, fewer users.
    pub fn quick(mut self) -> Self {
        self.duration_secs = QUICK_DURATION_SECS;
        self.user_loads = QUICK_USER_LOADS.to_vec();
        self
    }

    /// `protocol://host:port`, without a trailing slash.
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn inter_request_pause(&self) -> Duration {
        Duration::from_millis(self.inter_request_pause_ms)
    }

    pub fn cool_down(&self) -> Duration {
        Duration::from_secs(self.cool_down_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}
