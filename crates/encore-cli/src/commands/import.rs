use anyhow::{Context, Result};
use encore_core::schema::Database;
use encore_engine::import_file;
use std::path::Path;

pub fn run_import(db: &Database, file: &Path) -> Result<()> {
    let report =
        import_file(db, file).with_context(|| format!("Failed to import {}", file.display()))?;

    println!("✓ Imported songs from {}", file.display());
    println!("  New:     {}", report.inserted);
    println!("  Updated: {}", report.updated);
    if report.skipped > 0 {
        println!("  Skipped: {} (missing external_id, title or artist)", report.skipped);
    }

    Ok(())
}
