use anyhow::{Context, Result};
use encore_core::schema::Database;
use encore_engine::{take_snapshot, Config};

pub fn run_snapshot(db: &mut Database, config: &Config) -> Result<()> {
    let report = take_snapshot(db, &config.scoring).context("Snapshot pass failed")?;

    println!("\n📸 Snapshot {}\n", report.snapshot_id);
    println!("  Songs captured: {}", report.captured);
    if report.failed > 0 {
        println!("  Songs failed:   {} (see log)", report.failed);
    }

    Ok(())
}
