use anyhow::Result;
use encore_core::schema::Database;
use encore_engine::{Config, EnrichOptions, Enricher};

use super::lastfm_client;

pub async fn run_enrich(db: &Database, config: &Config, limit: usize) -> Result<()> {
    let Some(client) = lastfm_client(config)? else {
        println!("No Last.fm API key configured.");
        println!("Set it in config or the environment:");
        println!("  encore config set lastfm_api_key <KEY>");
        println!("  ENCORE_LASTFM_API_KEY=<KEY>");
        return Ok(());
    };

    log::info!("Starting Last.fm enrichment (limit {limit})");
    let options = EnrichOptions {
        limit,
        delay: config.similarity.request_delay(),
    };
    let report = Enricher::new(&client, &client)
        .with_options(options)
        .enrich_missing(db)
        .await?;

    if report.attempted == 0 {
        println!("All songs already have Last.fm data.");
        return Ok(());
    }

    println!("\n✓ Enrichment finished\n");
    println!("  Enriched:  {}", report.enriched);
    println!("  Not found: {}", report.not_found);
    println!("  Failed:    {}", report.failed);

    Ok(())
}
