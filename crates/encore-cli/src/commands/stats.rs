use anyhow::Result;
use encore_core::schema::Database;
use encore_engine::Config;

pub fn show_stats(db: &Database, config: &Config) -> Result<()> {
    println!("\n📊 Encore Stats\n");
    println!("  Database:        {}", config.database_path.display());
    println!("  Users:           {}", db.count_users()?);
    println!("  Songs:           {}", db.count_songs()?);
    println!("  Favorites:       {}", db.count_favorites()?);
    println!("  Snapshot passes: {}", db.count_snapshot_passes()?);

    if db.count_songs()? == 0 {
        println!("\n  Run `encore import <FILE>` to load songs");
    }

    Ok(())
}
