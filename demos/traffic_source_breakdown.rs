//! Demo: one report per traffic source, then one for the selected sources combined.

use funnelhealth::table::FunnelTable;
use funnelhealth::FunnelEngine;

const TABLE: &str = "\
source,period,Visitor,Lead,MQL,SQL
Google Ads,Last 30 Days,5200,1400,610,240
Facebook Ads,Last 30 Days,3100,620,210,140
LinkedIn Ads,Last 30 Days,900,310,190,120
";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let engine = FunnelEngine::default();
    let table = FunnelTable::from_reader(TABLE.as_bytes())?;

    for row in table.reports_per_row(&engine)? {
        let flagged: Vec<String> = row
            .report
            .problematic_transitions()
            .iter()
            .map(|t| t.label())
            .collect();
        println!("{:<14} problematic: [{}]", row.source, flagged.join(", "));
    }

    let paid_social = ["Facebook Ads", "LinkedIn Ads"];
    let report = engine.report(&table.sum_counts_for(&paid_social)?)?;
    println!();
    println!("{} combined:", paid_social.join(" + "));
    for t in report.transitions() {
        println!(
            "  {:<16} drop {:>6}  {}",
            t.label(),
            t.drop_off_rate
                .map_or_else(|| "n/a".to_string(), |d| format!("{:.1}%", d * 100.0)),
            t.health_status
        );
    }
    Ok(())
}
