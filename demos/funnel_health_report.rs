//! End-to-end demo: a `Stage,Count` upload, user settings, and the full report.
//!
//! Run with `RUST_LOG=funnelhealth=debug` to see the boundary layers log what
//! they parsed.

use funnelhealth::insights::{compare_to_benchmarks, potential_impact, Benchmarks};
use funnelhealth::settings::load_config_json;
use funnelhealth::table::read_stage_counts;
use funnelhealth::FunnelEngine;
use tracing_subscriber::EnvFilter;

const UPLOAD: &str = "\
Stage,Count
Visitor,1000
Lead,400
MQL,150
SQL,130
";

const SETTINGS: &str = r#"{
    "drop_off_threshold": 35,
    "healthy_threshold": 20,
    "thresholds_as_percent": true
}"#;

fn pct(x: Option<f64>) -> String {
    x.map_or_else(|| "n/a".to_string(), |v| format!("{:.1}%", v * 100.0))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let engine = FunnelEngine::new(load_config_json(SETTINGS)?);
    let counts = read_stage_counts(UPLOAD.as_bytes())?;
    let report = engine.report(&counts)?;

    println!("{:<18} {:>6} {:>6} {:>10} {:>10}  status", "transition", "from", "to", "conv", "drop");
    for t in report.transitions() {
        println!(
            "{:<18} {:>6} {:>6} {:>10} {:>10}  {}",
            t.label(),
            t.from_count,
            t.to_count,
            pct(t.conversion_rate),
            pct(t.drop_off_rate),
            t.health_status
        );
    }
    println!();
    println!("overall conversion: {}", pct(report.overall_conversion()));
    if let Some(worst) = report.biggest_drop_off() {
        println!("biggest drop-off:   {} ({})", worst.label(), pct(worst.drop_off_rate));
    }

    println!();
    println!("potential impact at {:.0}% drop-off:", engine.config().drop_off_threshold() * 100.0);
    for est in potential_impact(&report, engine.config()) {
        match (est.potential_count, est.potential_increase) {
            (Some(potential), Some(increase)) => println!(
                "  {:<6} {} -> {} ({:+}, {})",
                est.to_stage,
                est.current_count,
                potential,
                increase,
                pct(est.improvement)
            ),
            _ => println!("  {:<6} no upstream volume", est.to_stage),
        }
    }

    println!();
    println!("vs. B2B SaaS benchmarks:");
    for c in compare_to_benchmarks(&report, &Benchmarks::default()) {
        println!(
            "  {:<16} actual {:>7} benchmark {:>7}  {}",
            c.label,
            pct(Some(c.actual)),
            pct(Some(c.benchmark)),
            c.performance
        );
    }

    // What a recommendation generator would receive.
    println!();
    println!("{}", serde_json::to_string_pretty(report.problematic_transitions())?);
    Ok(())
}
