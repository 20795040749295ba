//! Trending songs from snapshot deltas.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use encore_core::model::{SnapshotId, Song, SongId, SongSnapshot};
use encore_core::schema::Database;
use encore_core::Error;

use crate::error::EngineResult;

/// Rows returned by a trending query.
pub const TREND_LIMIT: usize = 10;

/// Rows selected by absolute delta before filling by current score.
pub const TOP_MOVERS: usize = 5;

/// Passes retained by the week window.
pub const WEEK_PASSES: usize = 7;

/// Which two snapshot passes to compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrendWindow {
    /// The two most recent passes.
    #[default]
    #[serde(rename = "24h")]
    Day,
    /// The most recent pass against the oldest of the last seven.
    #[serde(rename = "lastweek")]
    Week,
}

impl TrendWindow {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "24h",
            Self::Week => "lastweek",
        }
    }

    /// Passes that must exist before this window can be computed.
    pub fn required_passes(self) -> usize {
        match self {
            Self::Day => 2,
            Self::Week => WEEK_PASSES,
        }
    }

    /// Pick `(latest, previous)` from pass ids in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InsufficientData`] when too few passes exist.
    pub fn select<'a>(
        self,
        ids: &'a [SnapshotId],
    ) -> encore_core::Result<(&'a SnapshotId, &'a SnapshotId)> {
        let required = self.required_passes();
        if ids.len() < required {
            return Err(Error::InsufficientData {
                window: self.as_str().to_string(),
                required,
                available: ids.len(),
            });
        }
        let latest = &ids[ids.len() - 1];
        let previous = &ids[ids.len() - required];
        Ok((latest, previous))
    }
}

impl fmt::Display for TrendWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrendWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "24h" | "day" => Ok(Self::Day),
            "lastweek" | "week" | "7d" => Ok(Self::Week),
            other => Err(format!("unknown trend window '{other}' (expected 24h or lastweek)")),
        }
    }
}

/// A ranked trend row before it is joined to its song.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendRow {
    pub song_id: SongId,
    pub previous_score: Option<f64>,
    pub current_score: f64,
    pub delta: Option<f64>,
}

/// A trending song. `previous_score` and `delta` are absent when the
/// ranking fell back to absolute scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendEntry {
    pub song_id: SongId,
    pub song: Song,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_score: Option<f64>,
    pub current_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<f64>,
}

fn by_score_desc(a: &TrendRow, b: &TrendRow) -> std::cmp::Ordering {
    b.current_score.total_cmp(&a.current_score)
}

/// Rank movement between two passes.
///
/// Songs missing from `previous` are ignored. When no song moved, the top
/// [`TREND_LIMIT`] of `latest` by score are returned without deltas.
/// Otherwise the [`TOP_MOVERS`] largest absolute deltas come first,
/// followed by the highest current scores among the rest.
pub fn rank_trends(latest: &[SongSnapshot], previous: &[SongSnapshot]) -> Vec<TrendRow> {
    let previous_scores: HashMap<SongId, f64> =
        previous.iter().map(|s| (s.song_id, s.score)).collect();

    let moved: Vec<TrendRow> = latest
        .iter()
        .filter_map(|s| {
            previous_scores.get(&s.song_id).map(|prev| TrendRow {
                song_id: s.song_id,
                previous_score: Some(*prev),
                current_score: s.score,
                delta: Some(s.score - prev),
            })
        })
        .collect();

    if moved.iter().all(|row| row.delta == Some(0.0)) {
        let mut rows: Vec<TrendRow> = latest
            .iter()
            .map(|s| TrendRow {
                song_id: s.song_id,
                previous_score: None,
                current_score: s.score,
                delta: None,
            })
            .collect();
        rows.sort_by(by_score_desc);
        rows.truncate(TREND_LIMIT);
        return rows;
    }

    let mut by_delta = moved.clone();
    by_delta.sort_by(|a, b| {
        let a = a.delta.unwrap_or_default().abs();
        let b = b.delta.unwrap_or_default().abs();
        b.total_cmp(&a)
    });
    by_delta.truncate(TOP_MOVERS);

    let movers: HashSet<SongId> = by_delta.iter().map(|r| r.song_id).collect();
    let mut by_score: Vec<TrendRow> = moved
        .into_iter()
        .filter(|r| !movers.contains(&r.song_id))
        .collect();
    by_score.sort_by(by_score_desc);
    by_score.truncate(TREND_LIMIT - by_delta.len());

    by_delta.extend(by_score);
    by_delta
}

/// Trending songs for a window.
///
/// # Errors
///
/// Returns [`Error::InsufficientData`] (wrapped) when the window needs more
/// passes than exist, or a database error.
pub fn trending(db: &Database, window: TrendWindow) -> EngineResult<Vec<TrendEntry>> {
    let ids = db.list_snapshot_ids()?;
    let (latest_id, previous_id) = window.select(&ids)?;
    log::debug!("Comparing snapshot {latest_id} against {previous_id} ({window})");

    let latest = db.snapshots_for(latest_id)?;
    let previous = db.snapshots_for(previous_id)?;

    let mut entries = Vec::new();
    for row in rank_trends(&latest, &previous) {
        let Some(song) = db.get_song(&row.song_id)? else {
            log::warn!("Trending song {} no longer exists, skipping", row.song_id);
            continue;
        };
        entries.push(TrendEntry {
            song_id: row.song_id,
            song,
            previous_score: row.previous_score,
            current_score: row.current_score,
            delta: row.delta,
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pass(id: &str, scores: &[(SongId, f64)]) -> Vec<SongSnapshot> {
        scores
            .iter()
            .map(|(song_id, score)| SongSnapshot::new(*song_id, 0, *score, SnapshotId::from(id)))
            .collect()
    }

    fn ids(n: usize) -> Vec<SnapshotId> {
        (0..n).map(|i| SnapshotId::from(format!("p{i}"))).collect()
    }

    #[test]
    fn test_window_parse() {
        assert_eq!("24h".parse::<TrendWindow>().unwrap(), TrendWindow::Day);
        assert_eq!("LastWeek".parse::<TrendWindow>().unwrap(), TrendWindow::Week);
        assert!("month".parse::<TrendWindow>().is_err());
    }

    #[test]
    fn test_day_window_selects_adjacent_passes() {
        let ids = ids(4);
        let (latest, previous) = TrendWindow::Day.select(&ids).unwrap();
        assert_eq!(latest.as_str(), "p3");
        assert_eq!(previous.as_str(), "p2");
    }

    #[test]
    fn test_week_window_uses_retained_window() {
        let ids = ids(9);
        let (latest, previous) = TrendWindow::Week.select(&ids).unwrap();
        assert_eq!(latest.as_str(), "p8");
        assert_eq!(previous.as_str(), "p2");
    }

    #[test]
    fn test_insufficient_passes() {
        let err = TrendWindow::Day.select(&ids(1)).unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientData {
                required: 2,
                available: 1,
                ..
            }
        ));
        assert!(TrendWindow::Week.select(&ids(6)).is_err());
    }

    #[test]
    fn test_fallback_when_nothing_moved() {
        let songs: Vec<(SongId, f64)> = (0..12u32)
            .map(|i| (SongId::new(), f64::from(i) / 12.0))
            .collect();
        let rows = rank_trends(&pass("b", &songs), &pass("a", &songs));

        assert_eq!(rows.len(), TREND_LIMIT);
        assert!(rows.iter().all(|r| r.delta.is_none() && r.previous_score.is_none()));
        assert_eq!(rows[0].song_id, songs[11].0);
        assert!(rows.windows(2).all(|w| w[0].current_score >= w[1].current_score));
    }

    #[test]
    fn test_fallback_when_no_overlap() {
        let a = vec![(SongId::new(), 0.4)];
        let b = vec![(SongId::new(), 0.9)];
        let rows = rank_trends(&pass("b", &b), &pass("a", &a));
        assert_eq!(rows.len(), 1);
        assert!(rows[0].delta.is_none());
    }

    #[test]
    fn test_movers_then_leaders() {
        let ids: Vec<SongId> = (0..8).map(|_| SongId::new()).collect();
        let before: Vec<(SongId, f64)> = ids.iter().map(|id| (*id, 0.5)).collect();
        let mut after = before.clone();
        // One big faller, four small risers, three unchanged leaders.
        after[0].1 = 0.1;
        for (i, row) in after.iter_mut().enumerate().skip(1).take(4) {
            row.1 = 0.5 + 0.01 * f64::from(u32::try_from(i).unwrap());
        }
        after[5].1 = 0.5;
        after[6].1 = 0.5;
        after[7].1 = 0.5;

        let rows = rank_trends(&pass("b", &after), &pass("a", &before));
        assert_eq!(rows.len(), 8);
        assert_eq!(rows[0].song_id, ids[0]);
        assert!((rows[0].delta.unwrap() + 0.4).abs() < 1e-9);

        let unique: HashSet<SongId> = rows.iter().map(|r| r.song_id).collect();
        assert_eq!(unique.len(), rows.len());
        assert!(rows[5..].iter().all(|r| r.delta == Some(0.0)));
    }

    #[test]
    fn test_score_set_fills_after_movers() {
        let ids: Vec<SongId> = (0..20).map(|_| SongId::new()).collect();
        let before: Vec<(SongId, f64)> = ids.iter().map(|id| (*id, 0.2)).collect();
        let mut after = before.clone();
        for row in after.iter_mut().take(6) {
            row.1 = 0.3;
        }
        // Highest scorer with a small move; not among the top movers.
        after[19].1 = 0.21;

        let rows = rank_trends(&pass("b", &after), &pass("a", &before));
        assert_eq!(rows.len(), TREND_LIMIT);
        let leaders = &rows[TOP_MOVERS..];
        // Sixth riser did not fit among the movers, so it leads the score set.
        assert!((leaders[0].current_score - 0.3).abs() < 1e-9);
        assert_eq!(leaders[1].song_id, ids[19]);
    }

    #[test]
    fn test_trending_joins_songs_and_drops_missing() {
        let db = Database::open_in_memory().unwrap();
        let song = Song::new("dz-1", "Yellow", "Coldplay");
        db.insert_song(&song).unwrap();
        db.insert_snapshot(&SongSnapshot::new(song.id, 0, 0.2, SnapshotId::from("a")))
            .unwrap();
        db.insert_snapshot(&SongSnapshot::new(song.id, 3, 0.5, SnapshotId::from("b")))
            .unwrap();

        let entries = trending(&db, TrendWindow::Day).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].song.title, "Yellow");
        assert!((entries[0].delta.unwrap() - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_fallback_entry_omits_delta_in_json() {
        let entry = TrendEntry {
            song_id: SongId::new(),
            song: Song::new("dz-1", "Yellow", "Coldplay"),
            previous_score: None,
            current_score: 0.5,
            delta: None,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("delta").is_none());
        assert!(json.get("previous_score").is_none());
    }
}
