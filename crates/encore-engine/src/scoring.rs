//! Composite popularity scoring and snapshot passes.
//!
//! Every song is scored against the catalog-wide maxima of seven raw
//! signals. Each signal becomes a ratio in `[0, 1]` and the ratios are
//! combined with [`ScoreWeights`], so with non-negative weights summing to
//! one every score also lands in `[0, 1]`.

use serde::{Deserialize, Serialize};

use encore_core::model::{SnapshotId, Song, SongId, SongSnapshot};
use encore_core::schema::Database;
use encore_core::Error;

use crate::error::EngineResult;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Weight of each signal in the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub counter: f64,
    pub popularity: f64,
    pub playcount: f64,
    pub listeners: f64,
    pub rating: f64,
    pub youtube_views: f64,
    pub youtube_likes: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            counter: 0.3,
            popularity: 0.2,
            playcount: 0.1,
            listeners: 0.1,
            rating: 0.1,
            youtube_views: 0.1,
            youtube_likes: 0.1,
        }
    }
}

impl ScoreWeights {
    fn as_array(&self) -> [f64; 7] {
        [
            self.counter,
            self.popularity,
            self.playcount,
            self.listeners,
            self.rating,
            self.youtube_views,
            self.youtube_likes,
        ]
    }

    pub fn sum(&self) -> f64 {
        self.as_array().iter().sum()
    }

    /// Check that the weights are non-negative and sum to one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidData`] describing the offending weights.
    pub fn validate(&self) -> encore_core::Result<()> {
        if self.as_array().iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(Error::InvalidData(format!(
                "score weights must be non-negative: {self:?}"
            )));
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(Error::InvalidData(format!(
                "score weights must sum to 1.0, got {sum}"
            )));
        }
        Ok(())
    }
}

/// Raw signal values for one song. Absent sub-records contribute zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Signals {
    pub counter: f64,
    pub popularity: f64,
    pub playcount: f64,
    pub listeners: f64,
    pub rating: f64,
    pub youtube_views: f64,
    pub youtube_likes: f64,
}

impl Signals {
    #[allow(clippy::cast_precision_loss)]
    pub fn of(song: &Song) -> Self {
        Self {
            counter: song.counter as f64,
            popularity: song.popularity.unwrap_or(0.0).max(0.0),
            playcount: song.play_count() as f64,
            listeners: song.listeners() as f64,
            rating: song.rating_value().max(0.0),
            youtube_views: song.youtube_views() as f64,
            youtube_likes: song.youtube_likes() as f64,
        }
    }

    fn as_array(&self) -> [f64; 7] {
        [
            self.counter,
            self.popularity,
            self.playcount,
            self.listeners,
            self.rating,
            self.youtube_views,
            self.youtube_likes,
        ]
    }

    /// Catalog-wide maxima, each floored at 1.
    pub fn maxima<'a>(songs: impl IntoIterator<Item = &'a Song>) -> Self {
        let floor = Self {
            counter: 1.0,
            popularity: 1.0,
            playcount: 1.0,
            listeners: 1.0,
            rating: 1.0,
            youtube_views: 1.0,
            youtube_likes: 1.0,
        };
        songs.into_iter().map(Self::of).fold(floor, |acc, s| Self {
            counter: acc.counter.max(s.counter),
            popularity: acc.popularity.max(s.popularity),
            playcount: acc.playcount.max(s.playcount),
            listeners: acc.listeners.max(s.listeners),
            rating: acc.rating.max(s.rating),
            youtube_views: acc.youtube_views.max(s.youtube_views),
            youtube_likes: acc.youtube_likes.max(s.youtube_likes),
        })
    }

    /// Each signal divided by its maximum, clamped to `[0, 1]`.
    pub fn ratios(&self, maxima: &Self) -> [f64; 7] {
        let mut ratios = [0.0; 7];
        for ((ratio, value), max) in ratios
            .iter_mut()
            .zip(self.as_array())
            .zip(maxima.as_array())
        {
            *ratio = (value / max).clamp(0.0, 1.0);
        }
        ratios
    }
}

/// Weighted composite score of one song against the catalog maxima.
pub fn score_song(song: &Song, maxima: &Signals, weights: &ScoreWeights) -> f64 {
    Signals::of(song)
        .ratios(maxima)
        .iter()
        .zip(weights.as_array())
        .map(|(ratio, weight)| ratio * weight)
        .sum()
}

/// Score every song in a catalog, preserving catalog order.
pub fn score_catalog(songs: &[Song], weights: &ScoreWeights) -> Vec<(SongId, u64, f64)> {
    let maxima = Signals::maxima(songs);
    songs
        .iter()
        .map(|song| (song.id, song.counter, score_song(song, &maxima, weights)))
        .collect()
}

/// Outcome of one snapshot pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotReport {
    pub snapshot_id: SnapshotId,
    pub captured: usize,
    pub failed: usize,
}

/// Capture a snapshot of every song under a freshly generated id.
///
/// # Errors
///
/// Fails if the weights are invalid, the pass cannot start (another pass
/// holds the write lock past the busy timeout), or the pass cannot commit.
/// Individual row failures are counted in the report instead.
pub fn take_snapshot(db: &mut Database, weights: &ScoreWeights) -> EngineResult<SnapshotReport> {
    capture_pass(db, weights, SnapshotId::generate())
}

/// Capture a snapshot pass under the given id.
pub fn capture_pass(
    db: &mut Database,
    weights: &ScoreWeights,
    snapshot_id: SnapshotId,
) -> EngineResult<SnapshotReport> {
    weights.validate()?;

    let pass = db.begin_snapshot_pass()?;
    let songs = pass.songs()?;
    let mut report = SnapshotReport {
        snapshot_id,
        captured: 0,
        failed: 0,
    };

    for (song_id, counter, score) in score_catalog(&songs, weights) {
        let snapshot = SongSnapshot::new(song_id, counter, score, report.snapshot_id.clone());
        match pass.insert(&snapshot) {
            Ok(()) => report.captured += 1,
            Err(e) => {
                log::warn!("Failed to snapshot song {song_id}: {e}");
                report.failed += 1;
            }
        }
    }

    pass.commit()?;
    log::info!(
        "Snapshot {} captured {} songs ({} failed)",
        report.snapshot_id,
        report.captured,
        report.failed
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use encore_core::model::{LastFmData, MusicBrainzData, Rating};

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn catalog() -> Vec<Song> {
        vec![
            Song::new("dz-1", "Yellow", "Coldplay")
                .with_counter(10)
                .with_popularity(80.0)
                .with_lastfm(LastFmData {
                    playcount: 1000,
                    listeners: 100,
                    ..LastFmData::default()
                })
                .with_musicbrainz(MusicBrainzData {
                    rating: Some(Rating {
                        value: 5.0,
                        votes: 3,
                    }),
                    ..MusicBrainzData::default()
                }),
            Song::new("dz-2", "Creep", "Radiohead")
                .with_counter(5)
                .with_popularity(40.0),
            Song::new("dz-3", "Unknown", "Nobody"),
        ]
    }

    #[test]
    fn test_default_weights_are_valid() {
        let weights = ScoreWeights::default();
        assert!(approx(weights.sum(), 1.0));
        assert!(weights.validate().is_ok());
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let heavy = ScoreWeights {
            counter: 0.9,
            ..ScoreWeights::default()
        };
        assert!(heavy.validate().is_err());

        let negative = ScoreWeights {
            counter: 0.5,
            popularity: -0.0001,
            ..ScoreWeights::default()
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_maxima_floored_at_one() {
        let songs = vec![Song::new("dz-3", "Unknown", "Nobody")];
        let maxima = Signals::maxima(&songs);
        assert!(approx(maxima.counter, 1.0));
        assert!(approx(maxima.youtube_likes, 1.0));
    }

    #[test]
    fn test_scores_are_weighted_ratios() {
        let songs = catalog();
        let scores = score_catalog(&songs, &ScoreWeights::default());

        // Top song on counter, popularity, playcount, listeners and rating.
        assert!(approx(scores[0].2, 0.3 + 0.2 + 0.1 + 0.1 + 0.1));
        // Half the counter and half the popularity of the leader.
        assert!(approx(scores[1].2, 0.3 * 0.5 + 0.2 * 0.5));
        assert!(approx(scores[2].2, 0.0));
        assert_eq!(scores[1].1, 5);
    }

    #[test]
    fn test_scores_bounded() {
        let songs = catalog();
        for (_, _, score) in score_catalog(&songs, &ScoreWeights::default()) {
            assert!((0.0..=1.0).contains(&score));
        }
    }

    #[test]
    fn test_capture_pass_persists_every_song() {
        let mut db = Database::open_in_memory().unwrap();
        for song in catalog() {
            db.insert_song(&song).unwrap();
        }

        let report =
            capture_pass(&mut db, &ScoreWeights::default(), SnapshotId::from("pass-1")).unwrap();
        assert_eq!(report.captured, 3);
        assert_eq!(report.failed, 0);

        let rows = db.snapshots_for(&SnapshotId::from("pass-1")).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.snapshot_id.as_str() == "pass-1"));
    }

    #[test]
    fn test_snapshot_does_not_mutate_songs() {
        let mut db = Database::open_in_memory().unwrap();
        let song = Song::new("dz-1", "Yellow", "Coldplay").with_counter(7);
        db.insert_song(&song).unwrap();

        take_snapshot(&mut db, &ScoreWeights::default()).unwrap();

        let stored = db.require_song(&song.id).unwrap();
        assert_eq!(stored.counter, 7);
    }

    #[test]
    fn test_empty_catalog_snapshot() {
        let mut db = Database::open_in_memory().unwrap();
        let report = take_snapshot(&mut db, &ScoreWeights::default()).unwrap();
        assert_eq!(report.captured, 0);
        assert!(db.list_snapshot_ids().unwrap().is_empty());
    }
}
