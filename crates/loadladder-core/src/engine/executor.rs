use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::{ensure_valid, LadderConfig};
use crate::engine::scaling::{analyze_scaling, ScalingTrend};
use crate::engine::virtual_user::{new_sample_log, run_virtual_user, take_samples};
use crate::engine::{LadderEvent, ScenarioDriver};
use crate::error::LadderError;
use crate::http::RequestExecutor;
use crate::results::{Provenance, ScenarioResult, Summary};

// ---------------------------------------------------------------------------
// NetworkDriver
// ---------------------------------------------------------------------------

/// Runs scenarios by spawning one task per simulated user.
pub struct NetworkDriver<E> {
    executor: Arc<E>,
    endpoints: Arc<[String]>,
    pause: Duration,
}

impl<E: RequestExecutor> NetworkDriver<E> {
    pub fn new(executor: E, endpoints: Vec<String>, pause: Duration) -> Self {
        Self {
            executor: Arc::new(executor),
            endpoints: endpoints.into(),
            pause,
        }
    }
}

impl<E: RequestExecutor> ScenarioDriver for NetworkDriver<E> {
    fn provenance(&self) -> Provenance {
        Provenance::Network
    }

    /// Spawn exactly `num_users` workers, wait for all of them, and merge
    /// their private logs.
    ///
    /// A worker that panics is counted in `worker_failures`; the samples it
    /// recorded before the fault are kept and its siblings are unaffected.
    /// A scenario stopped by `cancel` before its budget ran out is flagged
    /// `interrupted`.
    async fn run_scenario(
        &self,
        num_users: u32,
        duration: Duration,
        cancel: &CancellationToken,
    ) -> ScenarioResult {
        let started_at = Utc::now();
        let clock = Instant::now();
        let logs: Vec<_> = (0..num_users).map(|_| new_sample_log()).collect();

        let mut vu_join_set = JoinSet::new();
        for (worker_id, log) in (0..num_users).zip(logs.iter()) {
            let executor = Arc::clone(&self.executor);
            let endpoints = Arc::clone(&self.endpoints);
            let cancel = cancel.clone();
            let log = Arc::clone(log);
            let pause = self.pause;

            vu_join_set.spawn(async move {
                let produced =
                    run_virtual_user(worker_id, executor, endpoints, duration, pause, cancel, log)
                        .await;
                (worker_id, produced)
            });
        }

        // Full barrier: nothing is merged while a worker is still running.
        let mut worker_failures = 0;
        while let Some(joined) = vu_join_set.join_next().await {
            match joined {
                Ok((worker_id, produced)) => {
                    tracing::debug!(worker_id, produced, "worker finished");
                }
                Err(e) => {
                    worker_failures += 1;
                    tracing::warn!("worker failed: {e}");
                }
            }
        }

        let interrupted = cancel.is_cancelled() && clock.elapsed() < duration;

        let mut samples = Vec::new();
        for log in &logs {
            samples.append(&mut take_samples(log));
        }

        ScenarioResult {
            run_id: Uuid::new_v4(),
            concurrency: num_users,
            duration,
            started_at,
            finished_at: Utc::now(),
            provenance: Provenance::Network,
            worker_failures,
            interrupted,
            samples,
        }
    }
}

// ---------------------------------------------------------------------------
// Ladder orchestration
// ---------------------------------------------------------------------------

/// A finished scenario and its reduced statistics.
///
/// The summary of an interrupted scenario measures throughput over the time
/// the scenario actually ran.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScenarioRecord {
    pub result: ScenarioResult,
    pub summary: Summary,
}

impl ScenarioRecord {
    pub fn new(result: ScenarioResult) -> Self {
        let summary = if result.interrupted {
            result.summarize_over(result.wall_time())
        } else {
            result.summarize()
        };
        Self { result, summary }
    }

    pub fn interrupted(&self) -> bool {
        self.result.interrupted
    }
}

/// Everything produced by [`run_ladder`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LadderOutcome {
    pub scenarios: Vec<ScenarioRecord>,
    pub trend: ScalingTrend,
    /// `true` when the run was stopped before every level completed.
    pub cancelled: bool,
}

impl LadderOutcome {
    pub fn summaries(&self) -> Vec<Summary> {
        self.scenarios.iter().map(|s| s.summary.clone()).collect()
    }

    /// Summaries of the scenarios that ran for their full duration.
    pub fn completed_summaries(&self) -> Vec<Summary> {
        completed_summaries(&self.scenarios)
    }

    /// User levels whose scenario was cut short by cancellation.
    pub fn interrupted_levels(&self) -> Vec<u32> {
        self.scenarios
            .iter()
            .filter(|s| s.interrupted())
            .map(|s| s.result.concurrency)
            .collect()
    }
}

fn completed_summaries(scenarios: &[ScenarioRecord]) -> Vec<Summary> {
    scenarios
        .iter()
        .filter(|s| !s.interrupted())
        .map(|s| s.summary.clone())
        .collect()
}

/// Run every configured user load in order through `driver`.
///
/// Each scenario is reduced as soon as it finishes and reported on
/// `result_tx`. A cool-down separates consecutive scenarios. Cancellation
/// stops the ladder after the current scenario. Completed scenarios are
/// still returned and analysed; a scenario cut short is returned flagged
/// as interrupted and left out of the scaling trend.
pub async fn run_ladder<D: ScenarioDriver>(
    driver: &D,
    config: &LadderConfig,
    cancel: &CancellationToken,
    result_tx: &mpsc::Sender<LadderEvent>,
) -> Result<LadderOutcome, LadderError> {
    ensure_valid(config)?;

    let levels = config.user_loads.len();
    let mut scenarios = Vec::with_capacity(levels);

    for (index, &users) in config.user_loads.iter().enumerate() {
        if cancel.is_cancelled() {
            break;
        }

        tracing::info!(users, provenance = %driver.provenance(), "running scenario");
        let _ = result_tx
            .send(LadderEvent::ScenarioStarted {
                users,
                provenance: driver.provenance(),
            })
            .await;

        let result = driver.run_scenario(users, config.duration(), cancel).await;
        let record = ScenarioRecord::new(result);
        let summary = &record.summary;
        if record.interrupted() {
            tracing::warn!(
                users,
                samples = summary.sample_count,
                ran_secs = summary.duration_sec,
                "scenario interrupted"
            );
        } else {
            tracing::info!(
                users,
                samples = summary.sample_count,
                avg_ms = summary.avg_ms,
                error_rate = summary.error_rate_percent,
                "scenario completed"
            );
        }
        let _ = result_tx
            .send(LadderEvent::ScenarioCompleted {
                summary: summary.clone(),
                worker_failures: record.result.worker_failures,
                interrupted: record.interrupted(),
            })
            .await;
        scenarios.push(record);

        let is_last = index + 1 == levels;
        if !is_last && !config.cool_down().is_zero() {
            tokio::select! {
                _ = sleep(config.cool_down()) => {}
                _ = cancel.cancelled() => {}
            }
        }
    }

    let cancelled = scenarios.len() < levels || cancel.is_cancelled();
    let trend = analyze_scaling(&completed_summaries(&scenarios));

    let _ = result_tx.send(LadderEvent::Complete { trend }).await;

    Ok(LadderOutcome {
        scenarios,
        trend,
        cancelled,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::simulated::SimulatedDriver;
    use crate::results::Sample;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Counts calls and answers after a short delay.
    struct CountingExecutor {
        calls: AtomicU64,
        delay: Duration,
    }

    impl CountingExecutor {
        fn new(delay: Duration) -> Self {
            Self {
                calls: AtomicU64::new(0),
                delay,
            }
        }
    }

    impl RequestExecutor for CountingExecutor {
        async fn execute(&self, endpoint: &str, worker_id: u32) -> Sample {
            let issued_at = Utc::now();
            self.calls.fetch_add(1, Ordering::SeqCst);
            sleep(self.delay).await;
            let url = format!("http://count{endpoint}");
            Sample::response(issued_at, 1, endpoint, url, worker_id, 200, 1)
        }
    }

    /// Panics on the third request of worker 3.
    struct FaultyExecutor {
        worker_three_calls: AtomicU64,
    }

    impl RequestExecutor for FaultyExecutor {
        async fn execute(&self, endpoint: &str, worker_id: u32) -> Sample {
            if worker_id == 3 && self.worker_three_calls.fetch_add(1, Ordering::SeqCst) == 2 {
                panic!("simulated worker fault");
            }
            sleep(Duration::from_millis(1)).await;
            Sample::response(Utc::now(), 1, endpoint, String::new(), worker_id, 200, 1)
        }
    }

    fn endpoints() -> Vec<String> {
        vec!["/api/v1/Resources".to_string(), "/api/v1/Workers".to_string()]
    }

    async fn assert_no_loss(users: u32) {
        let driver = NetworkDriver::new(
            CountingExecutor::new(Duration::from_millis(1)),
            endpoints(),
            Duration::from_millis(5),
        );
        let result = driver
            .run_scenario(users, Duration::from_millis(200), &CancellationToken::new())
            .await;

        let issued = driver.executor.calls.load(Ordering::SeqCst);
        assert_eq!(result.samples.len() as u64, issued);
        assert_eq!(result.concurrency, users);
        assert_eq!(result.worker_failures, 0);

        let mut per_worker: HashMap<u32, usize> = HashMap::new();
        for s in &result.samples {
            *per_worker.entry(s.worker_id).or_default() += 1;
        }
        assert_eq!(per_worker.len(), users as usize, "every worker should report");
        assert_eq!(per_worker.values().sum::<usize>(), result.samples.len());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn merge_is_lossless_with_one_user() {
        assert_no_loss(1).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn merge_is_lossless_with_fifty_users() {
        assert_no_loss(50).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn merge_is_lossless_with_three_hundred_users() {
        assert_no_loss(300).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn per_worker_order_is_preserved_in_merge() {
        let driver = NetworkDriver::new(
            CountingExecutor::new(Duration::from_millis(1)),
            endpoints(),
            Duration::from_millis(3),
        );
        let result = driver
            .run_scenario(8, Duration::from_millis(150), &CancellationToken::new())
            .await;

        for worker in 0..8 {
            let own: Vec<&Sample> = result
                .samples
                .iter()
                .filter(|s| s.worker_id == worker)
                .collect();
            for pair in own.windows(2) {
                assert!(pair[0].issued_at <= pair[1].issued_at);
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn panicking_worker_keeps_partial_samples_and_siblings() {
        let driver = NetworkDriver::new(
            FaultyExecutor {
                worker_three_calls: AtomicU64::new(0),
            },
            endpoints(),
            Duration::from_millis(5),
        );
        let result = driver
            .run_scenario(6, Duration::from_millis(200), &CancellationToken::new())
            .await;

        assert_eq!(result.worker_failures, 1);
        let from_faulty = result.samples.iter().filter(|s| s.worker_id == 3).count();
        assert_eq!(from_faulty, 2, "samples before the fault are kept");
        for worker in [0, 1, 2, 4, 5] {
            assert!(result.samples.iter().filter(|s| s.worker_id == worker).count() > 2);
        }
    }

    #[tokio::test]
    async fn zero_users_yields_empty_result() {
        let driver = NetworkDriver::new(
            CountingExecutor::new(Duration::from_millis(1)),
            endpoints(),
            Duration::from_millis(5),
        );
        let result = driver
            .run_scenario(0, Duration::from_millis(50), &CancellationToken::new())
            .await;
        assert!(result.samples.is_empty());
        assert_eq!(result.summarize().sample_count, 0);
    }

    // -----------------------------------------------------------------------
    // run_ladder
    // -----------------------------------------------------------------------

    fn ladder_config(user_loads: Vec<u32>) -> LadderConfig {
        LadderConfig {
            duration_secs: 1,
            user_loads,
            cool_down_secs: 0,
            ..LadderConfig::default()
        }
    }

    #[tokio::test]
    async fn ladder_runs_every_level_in_order() {
        let config = ladder_config(vec![1, 5, 20]);
        let driver = SimulatedDriver::from_config(&config);
        let (tx, mut rx) = mpsc::channel(64);

        let outcome = run_ladder(&driver, &config, &CancellationToken::new(), &tx)
            .await
            .expect("ladder should run");
        drop(tx);

        let users: Vec<u32> = outcome.scenarios.iter().map(|s| s.summary.concurrency).collect();
        assert_eq!(users, vec![1, 5, 20]);
        assert!(!outcome.cancelled);
        assert!(!matches!(outcome.trend, ScalingTrend::InsufficientData));
        assert!(outcome.summaries().iter().all(|s| s.provenance.is_simulated()));

        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        assert_eq!(events.len(), 3 * 2 + 1);
        assert!(matches!(events.last(), Some(LadderEvent::Complete { .. })));
    }

    #[tokio::test]
    async fn simulated_latency_growth_is_sub_linear() {
        // Latency grows by 2 ms per user on a 50 ms floor, far below user growth.
        let config = ladder_config(vec![1, 5, 20, 50]);
        let driver = SimulatedDriver::from_config(&config);
        let (tx, _rx) = mpsc::channel(64);

        let outcome = run_ladder(&driver, &config, &CancellationToken::new(), &tx)
            .await
            .expect("ladder should run");
        assert!(matches!(outcome.trend, ScalingTrend::SubLinear { .. }));
    }

    #[tokio::test]
    async fn single_level_ladder_is_insufficient_for_trend() {
        let config = ladder_config(vec![3]);
        let driver = SimulatedDriver::from_config(&config);
        let (tx, _rx) = mpsc::channel(8);

        let outcome = run_ladder(&driver, &config, &CancellationToken::new(), &tx)
            .await
            .expect("ladder should run");
        assert_eq!(outcome.scenarios.len(), 1);
        assert_eq!(outcome.trend, ScalingTrend::InsufficientData);
    }

    #[tokio::test]
    async fn cancelled_ladder_stops_early() {
        let config = ladder_config(vec![1, 5]);
        let driver = SimulatedDriver::from_config(&config);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (tx, _rx) = mpsc::channel(8);

        let outcome = run_ladder(&driver, &config, &cancel, &tx)
            .await
            .expect("ladder should run");
        assert!(outcome.scenarios.is_empty());
        assert!(outcome.cancelled);
        assert_eq!(outcome.trend, ScalingTrend::InsufficientData);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn cancelling_mid_scenario_flags_it_and_measures_real_time() {
        let config = LadderConfig {
            duration_secs: 20,
            user_loads: vec![4, 8],
            cool_down_secs: 0,
            ..LadderConfig::default()
        };
        let driver = NetworkDriver::new(
            CountingExecutor::new(Duration::from_millis(1)),
            endpoints(),
            Duration::from_millis(5),
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(300)).await;
            trigger.cancel();
        });
        let (tx, _rx) = mpsc::channel(16);

        let started = std::time::Instant::now();
        let outcome = run_ladder(&driver, &config, &cancel, &tx)
            .await
            .expect("ladder should run");
        assert!(started.elapsed() < Duration::from_secs(5));

        assert!(outcome.cancelled);
        assert_eq!(outcome.scenarios.len(), 1);
        let record = &outcome.scenarios[0];
        assert!(record.interrupted());
        assert!(record.summary.sample_count > 0);
        assert!(record.summary.duration_sec < 5.0);
        let nominal_rate = record.summary.sample_count as f64 / 20.0;
        assert!(record.summary.throughput_per_sec > nominal_rate * 4.0);

        assert_eq!(outcome.interrupted_levels(), vec![4]);
        assert!(outcome.completed_summaries().is_empty());
        assert_eq!(outcome.trend, ScalingTrend::InsufficientData);
    }

    /// Simulated driver that fires the cancellation token when it reaches
    /// `cancel_at` users.
    struct CancelAtLevel {
        inner: SimulatedDriver,
        cancel_at: u32,
        cancel: CancellationToken,
    }

    impl ScenarioDriver for CancelAtLevel {
        fn provenance(&self) -> Provenance {
            self.inner.provenance()
        }

        async fn run_scenario(
            &self,
            num_users: u32,
            duration: Duration,
            cancel: &CancellationToken,
        ) -> ScenarioResult {
            if num_users == self.cancel_at {
                self.cancel.cancel();
            }
            self.inner.run_scenario(num_users, duration, cancel).await
        }
    }

    #[tokio::test]
    async fn interrupted_scenario_is_left_out_of_the_trend() {
        let config = ladder_config(vec![1, 5, 20]);
        let cancel = CancellationToken::new();
        let driver = CancelAtLevel {
            inner: SimulatedDriver::from_config(&config),
            cancel_at: 20,
            cancel: cancel.clone(),
        };
        let (tx, mut rx) = mpsc::channel(16);

        let outcome = run_ladder(&driver, &config, &cancel, &tx)
            .await
            .expect("ladder should run");
        drop(tx);

        assert!(outcome.cancelled);
        assert_eq!(outcome.scenarios.len(), 3);
        assert_eq!(outcome.interrupted_levels(), vec![20]);
        let completed = outcome.completed_summaries();
        assert_eq!(completed.len(), 2);
        assert_eq!(outcome.trend, analyze_scaling(&completed));
        assert!(matches!(outcome.trend, ScalingTrend::SubLinear { .. }));

        let mut flags = Vec::new();
        while let Some(ev) = rx.recv().await {
            if let LadderEvent::ScenarioCompleted { interrupted, .. } = ev {
                flags.push(interrupted);
            }
        }
        assert_eq!(flags, vec![false, false, true]);
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_before_any_scenario() {
        let config = ladder_config(Vec::new());
        let driver = SimulatedDriver::from_config(&config);
        let (tx, _rx) = mpsc::channel(8);

        let err = run_ladder(&driver, &config, &CancellationToken::new(), &tx)
            .await
            .expect_err("empty ladder should be rejected");
        assert!(matches!(err, LadderError::Validation(_)));
    }

    #[tokio::test]
    async fn closed_event_channel_does_not_abort_the_run() {
        let config = ladder_config(vec![1, 2]);
        let driver = SimulatedDriver::from_config(&config);
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let outcome = run_ladder(&driver, &config, &CancellationToken::new(), &tx)
            .await
            .expect("ladder should run");
        assert_eq!(outcome.scenarios.len(), 2);
    }
}
