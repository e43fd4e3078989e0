use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::LadderConfig;
use crate::engine::ScenarioDriver;
use crate::results::{Provenance, Sample, ScenarioResult};

/// Latency floor of every simulated request.
pub const BASE_LATENCY_MS: u64 = 50;
/// Added latency per concurrent user.
pub const PER_USER_INCREMENT_MS: u64 = 2;
/// Upper bound (inclusive) of the uniform jitter.
pub const MAX_JITTER_MS: u64 = 100;
/// Body size reported by every simulated response.
pub const SIMULATED_BYTES: u64 = 5000;
/// Request rate a simulated user would reach with the 100 ms pause.
const REQUESTS_PER_SECOND: u64 = 10;

/// Deterministic stand-in for real network load.
///
/// Each simulated user performs `floor(duration * 10 / endpoint_count)`
/// rounds over the endpoint set. Latency grows linearly with concurrency and
/// the failure probability is `concurrency / 100`. Output is fully
/// determined by the seed and the concurrency level.
pub struct SimulatedDriver {
    base_url: String,
    endpoints: Arc<[String]>,
    seed: u64,
}

impl SimulatedDriver {
    pub fn new(base_url: impl Into<String>, endpoints: Vec<String>, seed: u64) -> Self {
        Self {
            base_url: base_url.into(),
            endpoints: endpoints.into(),
            seed,
        }
    }

    pub fn from_config(config: &LadderConfig) -> Self {
        Self::new(
            config.base_url(),
            config.endpoints.clone(),
            config.simulation_seed,
        )
    }

    /// Number of passes over the endpoint set each simulated user makes.
    pub fn rounds_per_user(&self, duration: Duration) -> u64 {
        if self.endpoints.is_empty() {
            return 0;
        }
        duration.as_secs().saturating_mul(REQUESTS_PER_SECOND) / self.endpoints.len() as u64
    }

    /// Generate every sample of one simulated scenario.
    ///
    /// `issued_at` timestamps are spaced 100 ms apart per user starting at
    /// `started_at`, as if each user had run with the standard pause.
    pub fn generate(
        &self,
        num_users: u32,
        duration: Duration,
        started_at: DateTime<Utc>,
    ) -> Vec<Sample> {
        let rounds = self.rounds_per_user(duration);
        let per_user = rounds as usize * self.endpoints.len();
        let mut samples = Vec::with_capacity(per_user * num_users as usize);

        let mut rng = StdRng::seed_from_u64(self.seed ^ u64::from(num_users));
        let latency_floor = BASE_LATENCY_MS + u64::from(num_users) * PER_USER_INCREMENT_MS;
        let failure_probability = f64::from(num_users) / 100.0;
        let spacing = chrono::Duration::milliseconds(1000 / REQUESTS_PER_SECOND as i64);

        for user in 0..num_users {
            let mut issued_at = started_at;
            for _ in 0..rounds {
                for endpoint in self.endpoints.iter() {
                    let elapsed_ms = latency_floor + rng.gen_range(0..=MAX_JITTER_MS);
                    let success = rng.gen::<f64>() > failure_probability;
                    let status = if success { 200 } else { 500 };
                    samples.push(Sample::response(
                        issued_at,
                        elapsed_ms,
                        endpoint,
                        format!("{}{}", self.base_url, endpoint),
                        user,
                        status,
                        SIMULATED_BYTES,
                    ));
                    issued_at += spacing;
                }
            }
        }

        samples
    }
}

impl ScenarioDriver for SimulatedDriver {
    fn provenance(&self) -> Provenance {
        Provenance::Simulated
    }

    async fn run_scenario(
        &self,
        num_users: u32,
        duration: Duration,
        cancel: &CancellationToken,
    ) -> ScenarioResult {
        let started_at = Utc::now();
        let interrupted = cancel.is_cancelled();
        let samples = if interrupted {
            Vec::new()
        } else {
            self.generate(num_users, duration, started_at)
        };
        tracing::info!(
            users = num_users,
            samples = samples.len(),
            "generated simulated results"
        );

        ScenarioResult {
            run_id: Uuid::new_v4(),
            concurrency: num_users,
            duration,
            started_at,
            finished_at: Utc::now(),
            provenance: Provenance::Simulated,
            worker_failures: 0,
            interrupted,
            samples,
        }
    }
}
