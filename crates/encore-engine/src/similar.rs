//! Similar tracks for a single song.

use serde::{Deserialize, Serialize};

use encore_core::model::{SimilarTrack, Song, SongId};
use encore_core::schema::Database;

use crate::error::EngineResult;
use crate::provider::SimilarityProvider;

/// Default number of similar tracks requested.
pub const SIMILAR_LIMIT: usize = 10;

/// A provider suggestion, with the catalog song it resolves to if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarMatch {
    pub track: SimilarTrack,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub song: Option<Song>,
}

impl SimilarMatch {
    pub fn in_catalog(&self) -> bool {
        self.song.is_some()
    }
}

/// Tracks similar to a catalog song, resolved against the catalog.
///
/// # Errors
///
/// Returns `NotFound` for an unknown song, the provider error if the
/// lookup fails, or a database error.
pub async fn similar_to_song(
    db: &Database,
    provider: &dyn SimilarityProvider,
    song_id: &SongId,
    limit: usize,
) -> EngineResult<Vec<SimilarMatch>> {
    let song = db.require_song(song_id)?;
    let tracks = provider.similar_tracks(&song.title, &song.artist, limit).await?;
    log::debug!(
        "{} suggested {} tracks similar to {}",
        provider.name(),
        tracks.len(),
        song.title
    );

    let mut matches = Vec::with_capacity(tracks.len());
    for track in tracks {
        let song = db.find_song_by_title_and_artist(&track.name, &track.artist)?;
        matches.push(SimilarMatch { track, song });
    }
    Ok(matches)
}
