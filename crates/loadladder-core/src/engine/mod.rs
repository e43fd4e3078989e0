use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::{FallbackPolicy, LadderConfig};
use crate::http::HttpExecutor;
use crate::results::{Provenance, ScenarioResult, Summary};

pub mod aggregator;
pub mod executor;
pub mod scaling;
pub mod simulated;
pub mod virtual_user;

pub use aggregator::{percentile, summarize};
pub use executor::{run_ladder, LadderOutcome, NetworkDriver, ScenarioRecord};
pub use scaling::{analyze_scaling, ScalingTrend};
pub use simulated::SimulatedDriver;
pub use virtual_user::run_virtual_user;

// ---------------------------------------------------------------------------
// ScenarioDriver
// ---------------------------------------------------------------------------

/// Produces the samples of one scenario at a fixed concurrency level.
///
/// The rest of the pipeline only sees [`ScenarioResult`]s and does not care
/// which implementation produced them, apart from the provenance tag.
pub trait ScenarioDriver: Send + Sync {
    fn provenance(&self) -> Provenance;

    fn run_scenario(
        &self,
        num_users: u32,
        duration: Duration,
        cancel: &CancellationToken,
    ) -> impl Future<Output = ScenarioResult> + Send;
}

/// The driver chosen once at startup.
pub enum Driver {
    Network(NetworkDriver<HttpExecutor>),
    Simulated(SimulatedDriver),
}

impl Driver {
    /// Pick the network or simulated driver for this run.
    ///
    /// `api_reachable` is the availability-probe result. The simulated
    /// driver is used when the policy is [`FallbackPolicy::Always`], when it
    /// is [`FallbackPolicy::WhenUnreachable`] and the probe failed, or when
    /// the HTTP client cannot be built.
    pub fn select(config: &LadderConfig, api_reachable: bool) -> Self {
        let simulate = match config.fallback {
            FallbackPolicy::Always => true,
            FallbackPolicy::WhenUnreachable => !api_reachable,
            FallbackPolicy::Never => false,
        };
        if simulate {
            tracing::warn!("generating simulated results instead of network load");
            return Driver::Simulated(SimulatedDriver::from_config(config));
        }

        match HttpExecutor::from_config(config) {
            Ok(executor) => Driver::Network(NetworkDriver::new(
                executor,
                config.endpoints.clone(),
                config.inter_request_pause(),
            )),
            Err(e) => {
                tracing::warn!("HTTP client unavailable ({e}), generating simulated results");
                Driver::Simulated(SimulatedDriver::from_config(config))
            }
        }
    }
}

impl ScenarioDriver for Driver {
    fn provenance(&self) -> Provenance {
        match self {
            Driver::Network(d) => d.provenance(),
            Driver::Simulated(d) => d.provenance(),
        }
    }

    async fn run_scenario(
        &self,
        num_users: u32,
        duration: Duration,
        cancel: &CancellationToken,
    ) -> ScenarioResult {
        match self {
            Driver::Network(d) => d.run_scenario(num_users, duration, cancel).await,
            Driver::Simulated(d) => d.run_scenario(num_users, duration, cancel).await,
        }
    }
}

// ---------------------------------------------------------------------------
// LadderEvent
// ---------------------------------------------------------------------------

/// An event emitted while a ladder runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LadderEvent {
    /// A scenario at `users` concurrency is about to start.
    ScenarioStarted { users: u32, provenance: Provenance },

    /// A scenario finished and was reduced. `interrupted` is set when
    /// cancellation cut it short.
    ScenarioCompleted {
        summary: Summary,
        worker_failures: u32,
        interrupted: bool,
    },

    /// Every scenario has run; the scaling trend is attached.
    Complete { trend: ScalingTrend },
}
