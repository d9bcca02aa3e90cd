//! Funnel metrics engine: conversion, drop-off and health per stage transition.
//!
//! For an ordered stage list \(s_0, \dots, s_{k-1}\) with counts \(n_i\), each
//! adjacent pair \(s_i \to s_{i+1}\) gets
//! \[
//! \operatorname{conv}_i = \min\left(1, \frac{n_{i+1}}{n_i}\right),\quad
//! \operatorname{drop}_i = \frac{n_i - \min(n_i, n_{i+1})}{n_i},
//! \]
//! both undefined when \(n_i = 0\).
//!
//! Classification against `(healthy, drop_off)` thresholds, boundaries inclusive:
//! - `drop >= drop_off` → [`HealthStatus::Problematic`]
//! - `drop <= healthy` → [`HealthStatus::Healthy`]
//! - otherwise → [`HealthStatus::Warning`]
//!
//! A transition with zero upstream volume is always `Problematic`.
//!
//! Notes:
//! - The engine never logs, never allocates shared state and never reads anything
//!   outside its arguments; identical inputs give value-identical reports.
//! - Downstream counts above upstream counts are a data anomaly, not an error:
//!   the conversion clamps to 1 and the drop-off to 0.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stage names of the standard marketing funnel, in order.
pub const DEFAULT_STAGES: [&str; 4] = ["Visitor", "Lead", "MQL", "SQL"];

/// Default drop-off fraction at or above which a transition is problematic.
pub const DEFAULT_DROP_OFF_THRESHOLD: f64 = 0.35;

/// Default drop-off fraction at or below which a transition is healthy.
pub const DEFAULT_HEALTHY_THRESHOLD: f64 = 0.20;

/// Reasons a [`FunnelConfig`] is rejected.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// At least two stages are needed to form a transition.
    #[error("stage order needs at least 2 stages, got {0}")]
    TooFewStages(usize),
    /// Each stage may appear only once in the stage order.
    #[error("stage {0:?} appears more than once in the stage order")]
    DuplicateStage(String),
    /// Thresholds are fractions in `[0, 1]` (NaN included here).
    #[error("{name} must lie in [0, 1], got {value}")]
    ThresholdOutOfRange {
        /// Which threshold was rejected.
        name: &'static str,
        /// The rejected value.
        value: f64,
    },
    /// The healthy threshold may not exceed the drop-off threshold.
    #[error("healthy threshold {healthy} exceeds drop-off threshold {drop_off}")]
    ThresholdsInverted {
        /// Configured healthy threshold.
        healthy: f64,
        /// Configured drop-off threshold.
        drop_off: f64,
    },
}

/// Errors for the funnel metrics engine.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A stage named in the stage order has no count in the input.
    #[error("no count supplied for stage {stage:?}")]
    MissingStageData {
        /// The stage that was looked up.
        stage: String,
    },
    /// Configuration failed validation.
    #[error("invalid funnel config: {0}")]
    InvalidConfig(#[from] ConfigError),
}

/// Convenience result type for this module.
pub type Result<T> = std::result::Result<T, Error>;

/// Ordered `(stage, count)` pairs for one funnel observation.
///
/// Lookups return the first entry with a matching name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageCounts {
    entries: Vec<(String, u64)>,
}

impl StageCounts {
    /// Empty count set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a count for `stage`.
    pub fn push(&mut self, stage: impl Into<String>, count: u64) {
        self.entries.push((stage.into(), count));
    }

    /// Count recorded for `stage`, if any.
    pub fn get(&self, stage: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|(name, _)| name == stage)
            .map(|&(_, count)| count)
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.entries.iter().map(|(name, count)| (name.as_str(), *count))
    }
}

impl<S: Into<String>> FromIterator<(S, u64)> for StageCounts {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(stage, count)| (stage.into(), count))
                .collect(),
        }
    }
}

/// Validated, immutable engine configuration.
///
/// The only way to obtain one is through [`FunnelConfig::new`] (or `Default`),
/// so every instance satisfies the stage and threshold invariants.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelConfig {
    stage_order: Vec<String>,
    drop_off_threshold: f64,
    healthy_threshold: f64,
}

fn check_threshold(name: &'static str, value: f64) -> std::result::Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::ThresholdOutOfRange { name, value })
    }
}

impl FunnelConfig {
    /// Build a config, validating stage order and thresholds.
    pub fn new<I, S>(stage_order: I, drop_off_threshold: f64, healthy_threshold: f64) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let stage_order: Vec<String> = stage_order.into_iter().map(Into::into).collect();
        if stage_order.len() < 2 {
            return Err(ConfigError::TooFewStages(stage_order.len()).into());
        }
        for (i, stage) in stage_order.iter().enumerate() {
            if stage_order[..i].contains(stage) {
                return Err(ConfigError::DuplicateStage(stage.clone()).into());
            }
        }
        check_threshold("drop_off_threshold", drop_off_threshold)?;
        check_threshold("healthy_threshold", healthy_threshold)?;
        if healthy_threshold > drop_off_threshold {
            return Err(ConfigError::ThresholdsInverted {
                healthy: healthy_threshold,
                drop_off: drop_off_threshold,
            }
            .into());
        }
        Ok(Self {
            stage_order,
            drop_off_threshold,
            healthy_threshold,
        })
    }

    /// Standard Visitor → Lead → MQL → SQL funnel with custom thresholds.
    pub fn with_thresholds(drop_off_threshold: f64, healthy_threshold: f64) -> Result<Self> {
        Self::new(DEFAULT_STAGES, drop_off_threshold, healthy_threshold)
    }

    /// Stage names in funnel order.
    pub fn stage_order(&self) -> &[String] {
        &self.stage_order
    }

    /// Drop-off fraction at or above which a transition is problematic.
    pub fn drop_off_threshold(&self) -> f64 {
        self.drop_off_threshold
    }

    /// Drop-off fraction at or below which a transition is healthy.
    pub fn healthy_threshold(&self) -> f64 {
        self.healthy_threshold
    }

    /// Classify a defined drop-off rate.
    pub fn classify(&self, drop_off_rate: f64) -> HealthStatus {
        if drop_off_rate >= self.drop_off_threshold {
            HealthStatus::Problematic
        } else if drop_off_rate <= self.healthy_threshold {
            HealthStatus::Healthy
        } else {
            HealthStatus::Warning
        }
    }
}

impl Default for FunnelConfig {
    fn default() -> Self {
        Self {
            stage_order: DEFAULT_STAGES.iter().map(|s| s.to_string()).collect(),
            drop_off_threshold: DEFAULT_DROP_OFF_THRESHOLD,
            healthy_threshold: DEFAULT_HEALTHY_THRESHOLD,
        }
    }
}

/// Drop-off severity of one transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Drop-off at or below the healthy threshold.
    Healthy,
    /// Drop-off strictly between the two thresholds.
    Warning,
    /// Drop-off at or above the drop-off threshold, or no upstream volume.
    Problematic,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Warning => "warning",
            HealthStatus::Problematic => "problematic",
        })
    }
}

/// Metrics for one adjacent stage pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionMetric {
    /// Upstream stage name.
    pub from_stage: String,
    /// Downstream stage name.
    pub to_stage: String,
    /// Upstream count.
    pub from_count: u64,
    /// Downstream count.
    pub to_count: u64,
    /// `to / from` clamped to `[0, 1]`; `None` when `from_count == 0`.
    pub conversion_rate: Option<f64>,
    /// `1 - conversion_rate`; `None` when `from_count == 0`.
    pub drop_off_rate: Option<f64>,
    /// Classification of the drop-off.
    pub health_status: HealthStatus,
}

impl TransitionMetric {
    /// Human-readable `"<from> to <to>"` label.
    pub fn label(&self) -> String {
        format!("{} to {}", self.from_stage, self.to_stage)
    }

    /// Shorthand for `health_status == Problematic`.
    pub fn is_problematic(&self) -> bool {
        self.health_status == HealthStatus::Problematic
    }
}

/// Engine output: every transition in stage order plus the problematic subset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelReport {
    transitions: Vec<TransitionMetric>,
    problematic_transitions: Vec<TransitionMetric>,
}

impl FunnelReport {
    /// All transitions, in stage order. Length is `stage_order.len() - 1`.
    pub fn transitions(&self) -> &[TransitionMetric] {
        &self.transitions
    }

    /// Problematic transitions, in stage order.
    pub fn problematic_transitions(&self) -> &[TransitionMetric] {
        &self.problematic_transitions
    }

    /// Count of the first stage.
    pub fn top_count(&self) -> u64 {
        self.transitions.first().map_or(0, |t| t.from_count)
    }

    /// Count of the last stage.
    pub fn bottom_count(&self) -> u64 {
        self.transitions.last().map_or(0, |t| t.to_count)
    }

    /// End-to-end conversion (last / first), clamped to `[0, 1]`.
    pub fn overall_conversion(&self) -> Option<f64> {
        let top = self.top_count();
        if top == 0 {
            return None;
        }
        Some((self.bottom_count() as f64 / top as f64).min(1.0))
    }

    /// Transition with the largest defined drop-off; ties go to the earliest.
    pub fn biggest_drop_off(&self) -> Option<&TransitionMetric> {
        let mut best: Option<(&TransitionMetric, f64)> = None;
        for t in &self.transitions {
            if let Some(rate) = t.drop_off_rate {
                if best.map_or(true, |(_, b)| rate > b) {
                    best = Some((t, rate));
                }
            }
        }
        best.map(|(t, _)| t)
    }
}

fn measure(from: (&str, u64), to: (&str, u64), config: &FunnelConfig) -> TransitionMetric {
    let (from_stage, from_count) = from;
    let (to_stage, to_count) = to;

    let (conversion_rate, drop_off_rate, health_status) = if from_count == 0 {
        (None, None, HealthStatus::Problematic)
    } else {
        // Both rates come from one exact integer ratio each, so a drop of exactly
        // 10% compares equal to a 0.10 threshold.
        let kept = to_count.min(from_count);
        let conversion = kept as f64 / from_count as f64;
        let drop_off = (from_count - kept) as f64 / from_count as f64;
        (Some(conversion), Some(drop_off), config.classify(drop_off))
    };

    TransitionMetric {
        from_stage: from_stage.to_string(),
        to_stage: to_stage.to_string(),
        from_count,
        to_count,
        conversion_rate,
        drop_off_rate,
        health_status,
    }
}

/// Compute the funnel report for one observation.
///
/// Every stage in `config.stage_order()` must have a count in `counts`; extra
/// entries in `counts` are ignored. Fails without a partial report otherwise.
pub fn compute_report(counts: &StageCounts, config: &FunnelConfig) -> Result<FunnelReport> {
    let mut resolved = Vec::with_capacity(config.stage_order.len());
    for stage in &config.stage_order {
        let count = counts.get(stage).ok_or_else(|| Error::MissingStageData {
            stage: stage.clone(),
        })?;
        resolved.push((stage.as_str(), count));
    }

    let transitions: Vec<TransitionMetric> = resolved
        .windows(2)
        .map(|pair| measure(pair[0], pair[1], config))
        .collect();
    let problematic_transitions = transitions
        .iter()
        .filter(|t| t.is_problematic())
        .cloned()
        .collect();

    Ok(FunnelReport {
        transitions,
        problematic_transitions,
    })
}

/// A stateless engine bound to one validated config.
///
/// Construct it where the config is known and pass it to whoever needs reports;
/// it holds nothing but the config, so sharing across threads is free.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunnelEngine {
    config: FunnelConfig,
}

impl FunnelEngine {
    /// Wrap a validated config.
    pub fn new(config: FunnelConfig) -> Self {
        Self { config }
    }

    /// The config this engine classifies with.
    pub fn config(&self) -> &FunnelConfig {
        &self.config
    }

    /// Same as [`compute_report`] with this engine's config.
    pub fn report(&self, counts: &StageCounts) -> Result<FunnelReport> {
        compute_report(counts, &self.config)
    }
}
