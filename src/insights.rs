//! Report consumers: what fixing a leak would be worth, and how the funnel
//! compares with typical B2B SaaS conversion rates.
//!
//! Both functions read a finished [`FunnelReport`] and nothing else.

use std::fmt;

use serde::Serialize;

use crate::funnel::{FunnelConfig, FunnelReport};

/// Errors for insight inputs.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Benchmark conversion rates are fractions in `[0, 1]`.
    #[error("benchmark {key:?} must lie in [0, 1], got {value}")]
    InvalidBenchmark {
        /// Transition label or `"Overall"`.
        key: String,
        /// The rejected rate.
        value: f64,
    },
}

/// Convenience result type for this module.
pub type Result<T> = std::result::Result<T, Error>;

/// Projected gain from bringing one problematic transition down to the
/// drop-off threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactEstimate {
    /// Upstream stage.
    pub from_stage: String,
    /// Downstream stage whose count would grow.
    pub to_stage: String,
    /// Downstream count today.
    pub current_count: u64,
    /// `floor(from_count * (1 - drop_off_threshold))`; `None` without upstream volume.
    pub potential_count: Option<u64>,
    /// `potential_count - current_count`.
    pub potential_increase: Option<i64>,
    /// `potential_increase / current_count`; `None` when either side is undefined or zero.
    pub improvement: Option<f64>,
}

fn signed(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Resolution of the threshold in the projection: parts per billion.
const PPB: u128 = 1_000_000_000;

/// `floor(from * (1 - drop_off))` in integer arithmetic, with `drop_off` rounded
/// to the nearest part per billion so decimal thresholds act exactly.
fn project(from: u64, drop_off: f64) -> u64 {
    let drop_ppb = ((drop_off * PPB as f64).round() as u128).min(PPB);
    let kept = from as u128 * (PPB - drop_ppb) / PPB;
    // kept <= from, so it fits.
    u64::try_from(kept).unwrap_or(from)
}

/// Impact estimates for every problematic transition, in stage order.
pub fn potential_impact(report: &FunnelReport, config: &FunnelConfig) -> Vec<ImpactEstimate> {
    let drop_off = config.drop_off_threshold();
    report
        .problematic_transitions()
        .iter()
        .map(|t| {
            let potential_count = (t.from_count > 0)
                .then(|| project(t.from_count, drop_off));
            let potential_increase =
                potential_count.map(|p| signed(p).saturating_sub(signed(t.to_count)));
            let improvement = potential_increase
                .filter(|_| t.to_count > 0)
                .map(|inc| inc as f64 / t.to_count as f64);
            ImpactEstimate {
                from_stage: t.from_stage.clone(),
                to_stage: t.to_stage.clone(),
                current_count: t.to_count,
                potential_count,
                potential_increase,
                improvement,
            }
        })
        .collect()
}

/// Reference conversion rates, keyed by `(from, to)` stage pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Benchmarks {
    transitions: Vec<(String, String, f64)>,
    overall: Option<f64>,
}

fn check_rate(key: impl Into<String>, value: f64) -> Result<f64> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(Error::InvalidBenchmark {
            key: key.into(),
            value,
        })
    }
}

impl Benchmarks {
    /// No benchmarks at all.
    pub fn empty() -> Self {
        Self {
            transitions: Vec::new(),
            overall: None,
        }
    }

    /// Set (or replace) the conversion benchmark for `from → to`.
    pub fn with_transition(mut self, from: &str, to: &str, rate: f64) -> Result<Self> {
        let rate = check_rate(format!("{from} to {to}"), rate)?;
        self.transitions.retain(|(f, t, _)| !(f == from && t == to));
        self.transitions.push((from.to_string(), to.to_string(), rate));
        Ok(self)
    }

    /// Set the end-to-end conversion benchmark.
    pub fn with_overall(mut self, rate: f64) -> Result<Self> {
        self.overall = Some(check_rate("Overall", rate)?);
        Ok(self)
    }

    /// Benchmark for `from → to`, if known.
    pub fn rate_for(&self, from: &str, to: &str) -> Option<f64> {
        self.transitions
            .iter()
            .find(|(f, t, _)| f == from && t == to)
            .map(|&(_, _, rate)| rate)
    }

    /// End-to-end benchmark, if known.
    pub fn overall(&self) -> Option<f64> {
        self.overall
    }
}

impl Default for Benchmarks {
    /// Typical B2B SaaS rates: 2% visitor→lead, 50% lead→MQL, 40% MQL→SQL, 0.4% overall.
    fn default() -> Self {
        Self {
            transitions: vec![
                ("Visitor".into(), "Lead".into(), 0.02),
                ("Lead".into(), "MQL".into(), 0.50),
                ("MQL".into(), "SQL".into(), 0.40),
            ],
            overall: Some(0.004),
        }
    }
}

/// Whether the funnel beats the benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Performance {
    /// Strictly better than the benchmark.
    Above,
    /// At or below the benchmark.
    Below,
}

impl fmt::Display for Performance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Performance::Above => "above",
            Performance::Below => "below",
        })
    }
}

/// One actual-vs-benchmark line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkComparison {
    /// `"<from> to <to>"` or `"Overall"`.
    pub label: String,
    /// Observed conversion rate.
    pub actual: f64,
    /// Reference conversion rate.
    pub benchmark: f64,
    /// `Above` iff `actual > benchmark`.
    pub performance: Performance,
    /// `actual - benchmark`.
    pub difference: f64,
}

fn compare(label: String, actual: f64, benchmark: f64) -> BenchmarkComparison {
    BenchmarkComparison {
        label,
        actual,
        benchmark,
        performance: if actual > benchmark {
            Performance::Above
        } else {
            Performance::Below
        },
        difference: actual - benchmark,
    }
}

/// Compare each transition (and the overall conversion) against `benchmarks`.
///
/// Transitions without a benchmark or without a defined conversion rate are
/// skipped. The overall line, when present, comes last.
pub fn compare_to_benchmarks(report: &FunnelReport, benchmarks: &Benchmarks) -> Vec<BenchmarkComparison> {
    let mut out: Vec<BenchmarkComparison> = report
        .transitions()
        .iter()
        .filter_map(|t| {
            let benchmark = benchmarks.rate_for(&t.from_stage, &t.to_stage)?;
            let actual = t.conversion_rate?;
            Some(compare(t.label(), actual, benchmark))
        })
        .collect();
    if let (Some(actual), Some(benchmark)) = (report.overall_conversion(), benchmarks.overall()) {
        out.push(compare("Overall".to_string(), actual, benchmark));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::funnel::{compute_report, StageCounts};
    use approx::assert_abs_diff_eq;

    fn example() -> (FunnelReport, FunnelConfig) {
        let counts: StageCounts = [("Visitor", 1000u64), ("Lead", 400), ("MQL", 150), ("SQL", 130)]
            .into_iter()
            .collect();
        let config = FunnelConfig::with_thresholds(0.35, 0.20).unwrap();
        (compute_report(&counts, &config).unwrap(), config)
    }

    #[test]
    fn impact_for_each_problematic_transition() {
        let (report, config) = example();
        let impact = potential_impact(&report, &config);
        assert_eq!(impact.len(), 2);

        assert_eq!(impact[0].to_stage, "Lead");
        assert_eq!(impact[0].potential_count, Some(650));
        assert_eq!(impact[0].potential_increase, Some(250));
        assert_abs_diff_eq!(impact[0].improvement.unwrap(), 0.625, epsilon = 1e-12);

        assert_eq!(impact[1].to_stage, "MQL");
        assert_eq!(impact[1].potential_count, Some(260));
        assert_eq!(impact[1].potential_increase, Some(110));
        assert_abs_diff_eq!(impact[1].improvement.unwrap(), 110.0 / 150.0, epsilon = 1e-12);
    }

    #[test]
    fn projection_at_slider_thresholds_is_exact() {
        let at = |threshold: f64| {
            let config = FunnelConfig::new(["Visitor", "Lead"], threshold, 0.0).unwrap();
            let counts: StageCounts = [("Visitor", 100u64), ("Lead", 0)].into_iter().collect();
            let report = compute_report(&counts, &config).unwrap();
            potential_impact(&report, &config)[0].potential_count
        };
        assert_eq!(at(0.34), Some(66));
        assert_eq!(at(0.55), Some(45));
        for percent in 1..100u64 {
            assert_eq!(
                at(percent as f64 / 100.0),
                Some(100 - percent),
                "threshold {}%",
                percent
            );
        }
    }

    #[test]
    fn projection_handles_extreme_counts() {
        assert_eq!(project(u64::MAX, 0.0), u64::MAX);
        assert_eq!(project(u64::MAX, 1.0), 0);
        assert_eq!(project(7, 0.5), 3);
    }

    #[test]
    fn impact_without_upstream_or_downstream_volume() {
        let counts: StageCounts = [("Visitor", 200u64), ("Lead", 0), ("MQL", 0), ("SQL", 0)]
            .into_iter()
            .collect();
        let config = FunnelConfig::with_thresholds(0.5, 0.25).unwrap();
        let report = compute_report(&counts, &config).unwrap();
        let impact = potential_impact(&report, &config);
        assert_eq!(impact.len(), 3);

        assert_eq!(impact[0].potential_count, Some(100));
        assert_eq!(impact[0].potential_increase, Some(100));
        assert_eq!(impact[0].improvement, None);

        assert_eq!(impact[1].potential_count, None);
        assert_eq!(impact[1].potential_increase, None);
    }

    #[test]
    fn default_benchmark_comparison() {
        let (report, _) = example();
        let cmp = compare_to_benchmarks(&report, &Benchmarks::default());
        let labels: Vec<&str> = cmp.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, ["Visitor to Lead", "Lead to MQL", "MQL to SQL", "Overall"]);

        assert_eq!(cmp[0].performance, Performance::Above);
        assert_abs_diff_eq!(cmp[0].difference, 0.38, epsilon = 1e-12);
        assert_eq!(cmp[1].performance, Performance::Below);
        assert_abs_diff_eq!(cmp[1].difference, -0.125, epsilon = 1e-12);
        assert_eq!(cmp[2].performance, Performance::Above);
        assert_eq!(cmp[3].performance, Performance::Above);
        assert_abs_diff_eq!(cmp[3].actual, 0.13, epsilon = 1e-12);
    }

    #[test]
    fn equal_rate_is_below() {
        let (report, _) = example();
        let benchmarks = Benchmarks::empty().with_transition("Visitor", "Lead", 0.4).unwrap();
        let cmp = compare_to_benchmarks(&report, &benchmarks);
        assert_eq!(cmp.len(), 1);
        assert_eq!(cmp[0].performance, Performance::Below);
    }

    #[test]
    fn custom_benchmarks_replace_and_validate() {
        let b = Benchmarks::default()
            .with_transition("Lead", "MQL", 0.3)
            .unwrap()
            .with_overall(0.01)
            .unwrap();
        assert_eq!(b.rate_for("Lead", "MQL"), Some(0.3));
        assert_eq!(b.rate_for("SQL", "Won"), None);
        assert_eq!(b.overall(), Some(0.01));

        assert_eq!(
            Benchmarks::empty().with_transition("Lead", "MQL", 1.5).unwrap_err(),
            Error::InvalidBenchmark {
                key: "Lead to MQL".into(),
                value: 1.5
            }
        );
        assert!(Benchmarks::empty().with_overall(f64::NAN).is_err());
    }
}
