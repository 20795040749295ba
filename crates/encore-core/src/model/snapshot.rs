use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::ids::SongId;

/// Identifier shared by every snapshot captured in one pass.
///
/// Generated from the capture time as an RFC 3339 UTC timestamp, so ids
/// from successive passes sort in capture order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(String);

impl SnapshotId {
    #[must_use]
    pub fn generate() -> Self {
        Self::at(Utc::now())
    }

    #[must_use]
    pub fn at(time: DateTime<Utc>) -> Self {
        Self(time.to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SnapshotId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SnapshotId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An immutable popularity record for one song in one snapshot pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongSnapshot {
    pub song_id: SongId,

    /// Raw interaction counter at capture time.
    pub counter: u64,

    /// Weighted composite popularity score.
    pub score: f64,

    pub snapshot_id: SnapshotId,
    pub created_at: DateTime<Utc>,
}

impl SongSnapshot {
    #[must_use]
    pub fn new(song_id: SongId, counter: u64, score: f64, snapshot_id: SnapshotId) -> Self {
        Self {
            song_id,
            counter,
            score,
            snapshot_id,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_snapshot_ids_sort_chronologically() {
        let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let earlier = SnapshotId::at(t0);
        let later = SnapshotId::at(t0 + Duration::microseconds(1));
        assert!(earlier < later);
    }

    #[test]
    fn test_snapshot_id_format() {
        let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(SnapshotId::at(t0).as_str(), "2026-03-01T12:00:00.000000Z");
    }

    #[test]
    fn test_song_snapshot_new() {
        let song_id = SongId::new();
        let snap = SongSnapshot::new(song_id, 7, 0.42, SnapshotId::from("pass-1"));
        assert_eq!(snap.song_id, song_id);
        assert_eq!(snap.counter, 7);
        assert_eq!(snap.snapshot_id.as_str(), "pass-1");
    }
}
