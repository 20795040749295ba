pub mod config;
pub mod favorite;
pub mod song;
pub mod user;

mod enrich;
mod import;
mod recommend;
mod snapshot;
mod stats;
mod trending;

pub use enrich::run_enrich;
pub use import::run_import;
pub use recommend::run_recommend;
pub use snapshot::run_snapshot;
pub use stats::show_stats;
pub use trending::show_trending;

use anyhow::{Context, Result};
use encore_core::model::Song;
use encore_engine::{Config, LastFmClient};
use serde::Serialize;

/// One-line description of a song for listings.
fn song_line(song: &Song) -> String {
    match &song.genre {
        Some(genre) => format!("{} - {} ({genre})", song.title, song.artist),
        None => format!("{} - {}", song.title, song.artist),
    }
}

/// Build the Last.fm client if a key is configured.
fn lastfm_client(config: &Config) -> Result<Option<LastFmClient>> {
    let Some(key) = config.lastfm_key() else {
        return Ok(None);
    };
    let client = LastFmClient::new(key)
        .context("Failed to create Last.fm client")?
        .with_rate_limit(config.similarity.requests_per_second);
    Ok(Some(client))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
