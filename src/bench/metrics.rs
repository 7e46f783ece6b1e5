//! Scaling metrics.
//!
//! The only place speedup and efficiency are computed; trial runners return
//! raw durations and nothing else.

/// Derived scaling figures for one trial.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalingMetrics {
    /// `T1 / duration`, rounded to 2 decimals.
    pub speedup: f64,
    /// `(speedup / nodes) * 100`, rounded to 1 decimal.
    pub efficiency_percent: f64,
}

/// Compute speedup and efficiency for a trial against the series baseline.
///
/// A non-positive duration falls back to a speedup of exactly 1 rather than
/// dividing by zero; that is a degenerate measurement, not a crash.
/// Efficiency is derived from the rounded speedup, so the persisted pair is
/// self-consistent.
pub fn scaling_metrics(baseline_seconds: f64, duration_seconds: f64, nodes: usize) -> ScalingMetrics {
    let speedup = if duration_seconds > 0.0 {
        round_to(baseline_seconds / duration_seconds, 2)
    } else {
        1.0
    };
    let efficiency_percent = round_to(speedup / nodes as f64 * 100.0, 1);
    ScalingMetrics {
        speedup,
        efficiency_percent,
    }
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_trial_is_exactly_ideal() {
        let m = scaling_metrics(10.0, 10.0, 1);
        assert_eq!(m.speedup, 1.0);
        assert_eq!(m.efficiency_percent, 100.0);
    }

    #[test]
    fn known_duration_curve() {
        // Durations [10, 6, 3.5, 2] over nodes [1, 2, 4, 8].
        let expected = [(1, 1.0, 100.0), (2, 1.67, 83.5), (4, 2.86, 71.5), (8, 5.0, 62.5)];
        let durations = [10.0, 6.0, 3.5, 2.0];
        for ((nodes, speedup, efficiency), duration) in expected.into_iter().zip(durations) {
            let m = scaling_metrics(10.0, duration, nodes);
            assert_eq!(m.speedup, speedup, "speedup at {nodes} nodes");
            assert_eq!(m.efficiency_percent, efficiency, "efficiency at {nodes} nodes");
        }
    }

    #[test]
    fn zero_duration_falls_back_to_unity() {
        let m = scaling_metrics(10.0, 0.0, 4);
        assert_eq!(m.speedup, 1.0);
        assert_eq!(m.efficiency_percent, 25.0);
    }

    #[test]
    fn negative_duration_also_falls_back() {
        let m = scaling_metrics(10.0, -1.0, 2);
        assert_eq!(m.speedup, 1.0);
        assert_eq!(m.efficiency_percent, 50.0);
    }

    #[test]
    fn efficiency_uses_rounded_speedup() {
        // 10/3 rounds to 3.33 first; efficiency derives from that value.
        let m = scaling_metrics(10.0, 3.0, 4);
        assert_eq!(m.speedup, 3.33);
        assert_eq!(m.efficiency_percent, round_to(3.33 / 4.0 * 100.0, 1));
    }
}
