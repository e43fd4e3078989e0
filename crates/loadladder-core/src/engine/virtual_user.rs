use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

use crate::http::RequestExecutor;
use crate::results::Sample;

/// Private, append-only sample buffer owned by exactly one worker.
///
/// The scenario runner keeps a handle so that samples recorded before a
/// worker fault survive it. Only the owning worker writes while it runs.
pub type SampleLog = Arc<Mutex<Vec<Sample>>>;

pub fn new_sample_log() -> SampleLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Drain a sample log, tolerating a poisoned lock left by a panicking worker.
pub fn take_samples(log: &SampleLog) -> Vec<Sample> {
    let mut guard = log.lock().unwrap_or_else(PoisonError::into_inner);
    std::mem::take(&mut *guard)
}

fn record(log: &SampleLog, sample: Sample) {
    log.lock().unwrap_or_else(PoisonError::into_inner).push(sample);
}

/// Run a single simulated user until its `budget` is spent.
///
/// Cycles through `endpoints` in order, issuing one request per endpoint and
/// pausing `pause` after each. The budget and `cancel` are checked before
/// every request, never mid-request, so the last request may finish after
/// the deadline. Failed requests are recorded like any other sample.
///
/// Returns the number of samples appended to `log`.
pub async fn run_virtual_user<E: RequestExecutor>(
    worker_id: u32,
    executor: Arc<E>,
    endpoints: Arc<[String]>,
    budget: Duration,
    pause: Duration,
    cancel: CancellationToken,
    log: SampleLog,
) -> usize {
    if endpoints.is_empty() {
        return 0;
    }

    // A budget too large to represent never expires.
    let deadline = Instant::now().checked_add(budget);
    let mut produced = 0;

    'run: loop {
        for endpoint in endpoints.iter() {
            let expired = deadline.is_some_and(|d| Instant::now() >= d);
            if cancel.is_cancelled() || expired {
                break 'run;
            }

            let sample = executor.execute(endpoint, worker_id).await;
            record(&log, sample);
            produced += 1;

            if pause.is_zero() {
                tokio::task::yield_now().await;
                continue;
            }
            tokio::select! {
                _ = sleep(pause) => {}
                _ = cancel.cancelled() => break 'run,
            }
        }
    }

    produced
}
