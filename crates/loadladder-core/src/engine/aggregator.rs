use std::time::Duration;

use crate::results::{Provenance, Sample, Summary};

// ---------------------------------------------------------------------------
// Reduction
// ---------------------------------------------------------------------------

/// Reduce a frozen sample collection to a [`Summary`].
///
/// Throughput is computed against the nominal scenario `duration`, not the
/// measured wall time. An empty collection yields [`Summary::empty`].
pub fn summarize(
    samples: &[Sample],
    concurrency: u32,
    duration: Duration,
    provenance: Provenance,
) -> Summary {
    let duration_sec = duration.as_secs_f64();
    if samples.is_empty() {
        return Summary::empty(concurrency, duration_sec, provenance);
    }

    let mut sorted: Vec<u64> = samples.iter().map(|s| s.elapsed_ms).collect();
    sorted.sort_unstable();

    let n = sorted.len();
    let successes = samples.iter().filter(|s| s.success).count();
    let mean = mean(&sorted);

    let throughput_per_sec = if duration_sec > 0.0 {
        n as f64 / duration_sec
    } else {
        0.0
    };

    Summary {
        concurrency,
        sample_count: n as u64,
        avg_ms: mean,
        min_ms: sorted[0],
        max_ms: sorted[n - 1],
        median_ms: median(&sorted),
        p90_ms: percentile(&sorted, 90.0),
        p95_ms: percentile(&sorted, 95.0),
        p99_ms: percentile(&sorted, 99.0),
        std_dev_ms: sample_std_dev(&sorted, mean),
        error_rate_percent: (n - successes) as f64 / n as f64 * 100.0,
        throughput_per_sec,
        duration_sec,
        provenance,
    }
}

// ---------------------------------------------------------------------------
// Helpers over ascending-sorted slices
// ---------------------------------------------------------------------------

/// The p-th percentile of an ascending-sorted slice.
///
/// Picks the element at index `floor(n * p / 100)` without interpolation, so
/// p99 of 100 values is the last one. The index is clamped to `n - 1`.
/// Returns 0 for an empty slice.
pub fn percentile(sorted: &[u64], p: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let idx = ((p / 100.0) * sorted.len() as f64).floor() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Middle value, or the mean of the two middle values when `n` is even.
pub fn median(sorted: &[u64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        sorted[n / 2] as f64
    } else {
        (sorted[n / 2 - 1] as f64 + sorted[n / 2] as f64) / 2.0
    }
}

fn mean(values: &[u64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sum: u128 = values.iter().map(|&v| v as u128).sum();
    sum as f64 / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator); 0 for one value or fewer.
fn sample_std_dev(values: &[u64], mean: f64) -> f64 {
    if values.len() <= 1 {
        return 0.0;
    }
    let sum_sq: f64 = values
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum();
    (sum_sq / (values.len() - 1) as f64).sqrt()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
