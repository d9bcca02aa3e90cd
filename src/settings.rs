//! Loosely-typed settings translated once into a validated [`FunnelConfig`].
//!
//! Callers (dashboards, job runners) hand over whatever they collected from users
//! as JSON. Every field has a default, so `{}` is the standard funnel with the
//! default thresholds. Thresholds may be given on the 0-100 slider scale by
//! setting `thresholds_as_percent`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::funnel::{self, FunnelConfig, DEFAULT_DROP_OFF_THRESHOLD, DEFAULT_HEALTHY_THRESHOLD, DEFAULT_STAGES};

/// Errors for loading settings.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Settings file could not be read.
    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),
    /// Settings were not valid JSON for [`FunnelSettings`].
    #[error("failed to parse settings: {0}")]
    Json(#[from] serde_json::Error),
    /// Settings parsed but describe an invalid config.
    #[error(transparent)]
    Funnel(#[from] funnel::Error),
}

/// Convenience result type for this module.
pub type Result<T> = std::result::Result<T, Error>;

/// User-facing settings, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FunnelSettings {
    /// Stage names in funnel order.
    pub stage_order: Vec<String>,
    /// Drop-off at or above which a transition is problematic.
    pub drop_off_threshold: f64,
    /// Drop-off at or below which a transition is healthy.
    pub healthy_threshold: f64,
    /// Interpret both thresholds as percentages (`35.0` means `0.35`).
    pub thresholds_as_percent: bool,
}

impl Default for FunnelSettings {
    fn default() -> Self {
        Self {
            stage_order: DEFAULT_STAGES.iter().map(|s| s.to_string()).collect(),
            drop_off_threshold: DEFAULT_DROP_OFF_THRESHOLD,
            healthy_threshold: DEFAULT_HEALTHY_THRESHOLD,
            thresholds_as_percent: false,
        }
    }
}

impl FunnelSettings {
    /// Parse settings from a JSON document.
    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Validate into an engine config.
    pub fn into_config(self) -> funnel::Result<FunnelConfig> {
        let scale = if self.thresholds_as_percent { 100.0 } else { 1.0 };
        FunnelConfig::new(
            self.stage_order,
            self.drop_off_threshold / scale,
            self.healthy_threshold / scale,
        )
    }
}

impl TryFrom<FunnelSettings> for FunnelConfig {
    type Error = funnel::Error;

    fn try_from(settings: FunnelSettings) -> funnel::Result<Self> {
        settings.into_config()
    }
}

/// Parse and validate a JSON settings document.
pub fn load_config_json(s: &str) -> Result<FunnelConfig> {
    let settings = FunnelSettings::from_json_str(s)?;
    let config = settings.into_config()?;
    tracing::debug!(
        stages = ?config.stage_order(),
        drop_off_threshold = config.drop_off_threshold(),
        healthy_threshold = config.healthy_threshold(),
        "loaded funnel config"
    );
    Ok(config)
}

/// Read, parse and validate a JSON settings file.
pub fn load_config_file(path: impl AsRef<Path>) -> Result<FunnelConfig> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)?;
    tracing::debug!(path = %path.display(), "read funnel settings file");
    load_config_json(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::funnel::ConfigError;

    #[test]
    fn empty_document_is_the_default_config() {
        let config = load_config_json("{}").unwrap();
        assert_eq!(config, FunnelConfig::default());
    }

    #[test]
    fn percent_thresholds_are_scaled() {
        let config = load_config_json(
            r#"{"drop_off_threshold": 40, "healthy_threshold": 25, "thresholds_as_percent": true}"#,
        )
        .unwrap();
        assert_eq!(config.drop_off_threshold(), 0.4);
        assert_eq!(config.healthy_threshold(), 0.25);
    }

    #[test]
    fn custom_stage_order() {
        let config = load_config_json(r#"{"stage_order": ["Visitor", "Signup", "Paid"]}"#).unwrap();
        assert_eq!(config.stage_order(), ["Visitor", "Signup", "Paid"]);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = load_config_json(r#"{"threshold": 0.3}"#).unwrap_err();
        assert!(matches!(err, Error::Json(_)), "{err:?}");
    }

    #[test]
    fn validation_errors_pass_through() {
        let err = load_config_json(r#"{"drop_off_threshold": 0.3, "healthy_threshold": 0.5}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Funnel(funnel::Error::InvalidConfig(ConfigError::ThresholdsInverted { .. }))
        ));

        // Percent scale forgotten: 35 is not a fraction.
        let err = load_config_json(r#"{"drop_off_threshold": 35, "healthy_threshold": 0.2}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Funnel(funnel::Error::InvalidConfig(ConfigError::ThresholdOutOfRange { .. }))
        ));
    }

    #[test]
    fn try_from_matches_into_config() {
        let settings = FunnelSettings {
            drop_off_threshold: 0.3,
            ..FunnelSettings::default()
        };
        let a = FunnelConfig::try_from(settings.clone()).unwrap();
        let b = settings.into_config().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_config_file("/nonexistent/funnel-settings.json").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
