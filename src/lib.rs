//! Conversion-funnel health for marketing pipelines.
//!
//! Given per-stage counts for an ordered funnel (Visitor → Lead → MQL → SQL by
//! default), the engine derives conversion and drop-off rates for each adjacent
//! stage pair and classifies every transition as healthy, warning or problematic.
//!
//! Public invariants (must not change):
//! - The engine is a pure function of `(StageCounts, FunnelConfig)`: no I/O, no
//!   logging, no shared state. Identical inputs yield identical reports.
//! - Configs are validated once, at construction; a `FunnelConfig` value is
//!   always valid.
//! - Defined rates lie in `[0, 1]`; zero upstream volume means undefined rates
//!   and a `Problematic` transition.
//! - Multi-row data is reduced by the caller ([`table`]), never by the engine.

pub mod funnel;
pub mod insights;
pub mod settings;
pub mod table;

/// Re-export the engine surface at crate root.
pub use funnel::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_the_standard_funnel() {
        let config = FunnelConfig::default();
        assert_eq!(config.stage_order(), DEFAULT_STAGES);
        assert_eq!(config.drop_off_threshold(), DEFAULT_DROP_OFF_THRESHOLD);
        assert_eq!(config.healthy_threshold(), DEFAULT_HEALTHY_THRESHOLD);
        // Default must satisfy the same checks as `new`.
        assert_eq!(
            FunnelConfig::new(DEFAULT_STAGES, DEFAULT_DROP_OFF_THRESHOLD, DEFAULT_HEALTHY_THRESHOLD),
            Ok(config)
        );
    }
}
