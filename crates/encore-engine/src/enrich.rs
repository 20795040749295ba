//! Batch enrichment of songs with provider statistics.
//!
//! Songs without Last.fm data get play counts, listeners, top tags and
//! similar tracks. A failure for one song is logged and counted; the batch
//! carries on.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use encore_core::model::{SimilarTrack, Song};
use encore_core::schema::Database;

use crate::error::{EngineResult, ProviderResult};
use crate::provider::{SimilarityProvider, TrackInfoProvider};

/// Similar tracks stored per song.
pub const STORED_SIMILAR_TRACKS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrichOptions {
    /// Songs processed per batch.
    pub limit: usize,
    /// Pause between songs.
    pub delay: Duration,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            limit: 50,
            delay: Duration::from_millis(250),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichReport {
    pub attempted: usize,
    pub enriched: usize,
    pub not_found: usize,
    pub failed: usize,
}

/// Outcome for a single song.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichOutcome {
    Enriched,
    NotFound,
}

/// Fetches provider data for songs and stores it.
pub struct Enricher<'a> {
    info: &'a dyn TrackInfoProvider,
    similarity: &'a dyn SimilarityProvider,
    options: EnrichOptions,
}

impl std::fmt::Debug for Enricher<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enricher")
            .field("info", &self.info.name())
            .field("similarity", &self.similarity.name())
            .field("options", &self.options)
            .finish()
    }
}

impl<'a> Enricher<'a> {
    pub fn new(info: &'a dyn TrackInfoProvider, similarity: &'a dyn SimilarityProvider) -> Self {
        Self {
            info,
            similarity,
            options: EnrichOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: EnrichOptions) -> Self {
        self.options = options;
        self
    }

    /// Fetch and store provider data for one song.
    ///
    /// # Errors
    ///
    /// Returns the provider error if track info cannot be fetched, or a
    /// database error if the result cannot be stored. A failed similar
    /// track lookup only leaves the similar list empty.
    pub async fn enrich_song(&self, db: &Database, song: &Song) -> EngineResult<EnrichOutcome> {
        let Some(info) = self.info.track_info(&song.title, &song.artist).await? else {
            log::debug!("No {} data for {} by {}", self.info.name(), song.title, song.artist);
            return Ok(EnrichOutcome::NotFound);
        };

        let similar = self
            .similar_or_empty(&song.title, &song.artist)
            .await;
        db.update_lastfm_data(&song.id, &info.into_lastfm_data(similar))?;
        Ok(EnrichOutcome::Enriched)
    }

    async fn similar_or_empty(&self, title: &str, artist: &str) -> Vec<SimilarTrack> {
        let result: ProviderResult<Vec<SimilarTrack>> = self
            .similarity
            .similar_tracks(title, artist, STORED_SIMILAR_TRACKS)
            .await;
        result.unwrap_or_else(|e| {
            log::warn!("Similar tracks unavailable for {title} by {artist}: {e}");
            Vec::new()
        })
    }

    /// Enrich up to `limit` songs that have no provider data yet.
    ///
    /// # Errors
    ///
    /// Only fails if the candidate songs cannot be listed.
    pub async fn enrich_missing(&self, db: &Database) -> EngineResult<EnrichReport> {
        let songs = db.list_songs_missing_lastfm(self.options.limit)?;
        let mut report = EnrichReport::default();

        for (i, song) in songs.iter().enumerate() {
            if i > 0 && !self.options.delay.is_zero() {
                tokio::time::sleep(self.options.delay).await;
            }
            report.attempted += 1;
            match self.enrich_song(db, song).await {
                Ok(EnrichOutcome::Enriched) => report.enriched += 1,
                Ok(EnrichOutcome::NotFound) => report.not_found += 1,
                Err(e) => {
                    log::warn!("Failed to enrich {} by {}: {e}", song.title, song.artist);
                    report.failed += 1;
                }
            }
        }

        log::info!(
            "Enriched {} of {} songs ({} not found, {} failed)",
            report.enriched,
            report.attempted,
            report.not_found,
            report.failed
        );
        Ok(report)
    }
}
