//! Relatable demo: how many transitions get flagged as the drop-off threshold moves.
//!
//! The counts are fixed; only the problematic threshold changes. The healthy
//! threshold stays at 0.20 (clamped down when the sweep goes below it).

use funnelhealth::{compute_report, FunnelConfig, StageCounts};

fn main() {
    let counts: StageCounts = [("Visitor", 1000u64), ("Lead", 400), ("MQL", 150), ("SQL", 130)]
        .into_iter()
        .collect();

    println!("drop_off_threshold  problematic  warning  healthy");
    for step in 0..=10 {
        let drop_off = 0.30 + 0.04 * step as f64;
        let config = FunnelConfig::with_thresholds(drop_off, 0.20f64.min(drop_off)).unwrap();
        let report = compute_report(&counts, &config).unwrap();

        let mut tally = [0usize; 3];
        for t in report.transitions() {
            let slot = match t.health_status {
                funnelhealth::HealthStatus::Problematic => 0,
                funnelhealth::HealthStatus::Warning => 1,
                funnelhealth::HealthStatus::Healthy => 2,
            };
            tally[slot] += 1;
        }
        println!(
            "{drop_off:>18.2}  {:>11}  {:>7}  {:>7}",
            tally[0], tally[1], tally[2]
        );
    }
}
