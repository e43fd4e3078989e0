use serde::{Deserialize, Serialize};

use crate::results::Summary;

/// Average ratio below which latency is considered to grow sub-linearly.
pub const SUB_LINEAR_THRESHOLD: f64 = 0.7;
/// Average ratio above which latency is considered to grow super-linearly.
pub const SUPER_LINEAR_THRESHOLD: f64 = 1.3;

/// How average latency grows relative to concurrency across scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScalingTrend {
    /// Fewer than two summaries were supplied.
    InsufficientData,
    /// No adjacent pair produced a usable ratio.
    Undetermined,
    SubLinear { ratio: f64 },
    Linear { ratio: f64 },
    SuperLinear { ratio: f64 },
}

impl ScalingTrend {
    /// The averaged latency/users ratio, when one could be computed.
    pub fn ratio(&self) -> Option<f64> {
        match *self {
            ScalingTrend::SubLinear { ratio }
            | ScalingTrend::Linear { ratio }
            | ScalingTrend::SuperLinear { ratio } => Some(ratio),
            ScalingTrend::InsufficientData | ScalingTrend::Undetermined => None,
        }
    }

    pub fn is_super_linear(&self) -> bool {
        matches!(self, ScalingTrend::SuperLinear { .. })
    }
}

impl std::fmt::Display for ScalingTrend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ScalingTrend::InsufficientData => "Insufficient data for analysis",
            ScalingTrend::Undetermined => "Unable to calculate relationship",
            ScalingTrend::SubLinear { .. } => "Sub-linear - Excellent scalability",
            ScalingTrend::Linear { .. } => "Linear - Reasonable scalability",
            ScalingTrend::SuperLinear { .. } => "Super-linear - Needs optimization",
        };
        write!(f, "{s}")
    }
}

/// Classify the users→latency relationship of summaries ordered by
/// increasing concurrency.
///
/// Each adjacent pair contributes `(avg[i] / avg[i-1]) / (users[i] / users[i-1])`.
/// Pairs whose previous concurrency is 0, or whose ratio is not finite, are
/// skipped. The mean of the remaining ratios is compared strictly against
/// [`SUB_LINEAR_THRESHOLD`] and [`SUPER_LINEAR_THRESHOLD`].
pub fn analyze_scaling(summaries: &[Summary]) -> ScalingTrend {
    if summaries.len() < 2 {
        return ScalingTrend::InsufficientData;
    }

    let ratios: Vec<f64> = summaries
        .windows(2)
        .filter_map(|pair| {
            let (prev, cur) = (&pair[0], &pair[1]);
            if prev.concurrency == 0 {
                return None;
            }
            let user_ratio = cur.concurrency as f64 / prev.concurrency as f64;
            let time_ratio = cur.avg_ms / prev.avg_ms;
            let ratio = time_ratio / user_ratio;
            ratio.is_finite().then_some(ratio)
        })
        .collect();

    if ratios.is_empty() {
        return ScalingTrend::Undetermined;
    }

    let ratio = ratios.iter().sum::<f64>() / ratios.len() as f64;
    if ratio < SUB_LINEAR_THRESHOLD {
        ScalingTrend::SubLinear { ratio }
    } else if ratio > SUPER_LINEAR_THRESHOLD {
        ScalingTrend::SuperLinear { ratio }
    } else {
        ScalingTrend::Linear { ratio }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::Provenance;

    fn summary(users: u32, avg_ms: f64) -> Summary {
        let mut s = Summary::empty(users, 30.0, Provenance::Network);
        s.sample_count = 10;
        s.avg_ms = avg_ms;
        s
    }

    #[test]
    fn no_summaries_is_insufficient() {
        assert_eq!(analyze_scaling(&[]), ScalingTrend::InsufficientData);
    }

    #[test]
    fn single_summary_is_insufficient() {
        let trend = analyze_scaling(&[summary(1, 100.0)]);
        assert_eq!(trend, ScalingTrend::InsufficientData);
        assert_eq!(trend.to_string(), "Insufficient data for analysis");
        assert!(trend.ratio().is_none());
    }

    #[test]
    fn flat_latency_is_sub_linear() {
        let trend = analyze_scaling(&[summary(1, 100.0), summary(2, 100.0)]);
        assert_eq!(trend, ScalingTrend::SubLinear { ratio: 0.5 });
    }

    #[test]
    fn exact_upper_threshold_is_linear() {
        let trend = analyze_scaling(&[summary(1, 100.0), summary(2, 260.0)]);
        assert!(matches!(trend, ScalingTrend::Linear { .. }));
        assert!((trend.ratio().unwrap() - 1.3).abs() < 1e-12);
    }

    #[test]
    fn exact_lower_threshold_is_linear() {
        let trend = analyze_scaling(&[summary(1, 100.0), summary(2, 140.0)]);
        assert!(matches!(trend, ScalingTrend::Linear { .. }));
    }

    #[test]
    fn quadratic_growth_is_super_linear() {
        let trend = analyze_scaling(&[summary(1, 100.0), summary(2, 400.0), summary(4, 1600.0)]);
        assert_eq!(trend, ScalingTrend::SuperLinear { ratio: 2.0 });
        assert!(trend.is_super_linear());
        assert_eq!(trend.to_string(), "Super-linear - Needs optimization");
    }

    #[test]
    fn ratios_are_averaged_across_pairs() {
        // pair 1: (100/100)/(5/1) = 0.2, pair 2: (400/100)/(20/5) = 1.0
        let trend = analyze_scaling(&[summary(1, 100.0), summary(5, 100.0), summary(20, 400.0)]);
        assert!(matches!(trend, ScalingTrend::SubLinear { .. }));
        assert!((trend.ratio().unwrap() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn zero_users_pair_is_skipped() {
        let trend = analyze_scaling(&[summary(0, 100.0), summary(1, 100.0)]);
        assert_eq!(trend, ScalingTrend::Undetermined);
        assert_eq!(trend.to_string(), "Unable to calculate relationship");
    }

    #[test]
    fn zero_previous_average_is_skipped() {
        let trend = analyze_scaling(&[summary(1, 0.0), summary(2, 50.0), summary(4, 100.0)]);
        // Only the second pair is usable: (100/50)/(4/2) = 1.0
        assert_eq!(trend, ScalingTrend::Linear { ratio: 1.0 });
    }

    #[test]
    fn trend_serializes_with_kind_tag() {
        let json = serde_json::to_string(&ScalingTrend::Linear { ratio: 1.0 })
            .expect("serialize should succeed");
        assert_eq!(json, r#"{"kind":"linear","ratio":1.0}"#);
    }
}
