//! External data providers.
//!
//! Providers normalise third-party responses into the catalog's own
//! record shapes. They are constructed explicitly and injected into the
//! blender and the enricher, so tests can substitute fakes.

pub mod lastfm;
pub mod resilience;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use encore_core::model::{LastFmData, SimilarTrack};

use crate::error::ProviderResult;

pub use lastfm::LastFmClient;
pub use resilience::RateLimiter;

/// Play statistics and tags for a single track.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub playcount: u64,
    pub listeners: u64,
    pub tags: Vec<String>,
    pub mbid: Option<String>,
}

impl TrackInfo {
    /// Combine with a similar-track list into the stored enrichment record.
    pub fn into_lastfm_data(self, similar_tracks: Vec<SimilarTrack>) -> LastFmData {
        LastFmData {
            playcount: self.playcount,
            listeners: self.listeners,
            tags: self.tags,
            mbid: self.mbid,
            similar_tracks,
        }
    }
}

/// Looks up tracks similar to a given track.
#[async_trait]
pub trait SimilarityProvider: Send + Sync {
    /// Human-readable provider name for logs.
    fn name(&self) -> &str;

    /// Up to `limit` tracks similar to `title` by `artist`, best match
    /// first. An unknown track yields an empty list.
    async fn similar_tracks(
        &self,
        title: &str,
        artist: &str,
        limit: usize,
    ) -> ProviderResult<Vec<SimilarTrack>>;
}

/// Looks up play statistics and tags for a track.
#[async_trait]
pub trait TrackInfoProvider: Send + Sync {
    fn name(&self) -> &str;

    /// `None` when the provider does not know the track.
    async fn track_info(&self, title: &str, artist: &str) -> ProviderResult<Option<TrackInfo>>;
}
