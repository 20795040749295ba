use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::error::Result;
use crate::model::{SnapshotId, Song, SongId, SongSnapshot};

use super::db::{time_at, to_sql_int, u64_at, uuid_at, Database};
use super::songs::list_songs_on;

fn row_to_snapshot(row: &rusqlite::Row) -> rusqlite::Result<SongSnapshot> {
    Ok(SongSnapshot {
        song_id: SongId::from_uuid(uuid_at(row, 0)?),
        counter: u64_at(row, 1)?,
        score: row.get(2)?,
        snapshot_id: SnapshotId::from(row.get::<_, String>(3)?),
        created_at: time_at(row, 4)?,
    })
}

fn insert_snapshot_on(conn: &Connection, snapshot: &SongSnapshot) -> Result<()> {
    conn.execute(
        "INSERT INTO song_snapshots (song_id, counter, score, snapshot_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            snapshot.song_id.to_string(),
            to_sql_int(snapshot.counter),
            snapshot.score,
            snapshot.snapshot_id.as_str(),
            snapshot.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// An exclusive write window for one snapshot pass.
///
/// Holds an immediate transaction, so a second pass (from this process or
/// another) blocks until this one commits or is dropped. Dropping without
/// [`SnapshotPass::commit`] rolls the pass back.
#[derive(Debug)]
pub struct SnapshotPass<'db> {
    tx: Transaction<'db>,
}

impl SnapshotPass<'_> {
    /// Every song as of the start of the pass.
    pub fn songs(&self) -> Result<Vec<Song>> {
        list_songs_on(&self.tx)
    }

    /// Append one snapshot row. A failure leaves earlier rows intact.
    pub fn insert(&self, snapshot: &SongSnapshot) -> Result<()> {
        insert_snapshot_on(&self.tx, snapshot)
    }

    pub fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }
}

// Snapshot storage
impl Database {
    /// Start a serialised snapshot pass.
    pub fn begin_snapshot_pass(&mut self) -> Result<SnapshotPass<'_>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(SnapshotPass { tx })
    }

    /// Append a single snapshot row outside of a pass.
    pub fn insert_snapshot(&self, snapshot: &SongSnapshot) -> Result<()> {
        insert_snapshot_on(&self.conn, snapshot)
    }

    /// Distinct snapshot pass ids, oldest pass first.
    pub fn list_snapshot_ids(&self) -> Result<Vec<SnapshotId>> {
        let mut stmt = self.conn.prepare(
            "SELECT snapshot_id FROM song_snapshots
             GROUP BY snapshot_id ORDER BY MIN(id)",
        )?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .map(|r| r.map(SnapshotId::from))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    /// All rows captured in one pass, in capture order.
    pub fn snapshots_for(&self, snapshot_id: &SnapshotId) -> Result<Vec<SongSnapshot>> {
        let mut stmt = self.conn.prepare(
            "SELECT song_id, counter, score, snapshot_id, created_at
             FROM song_snapshots WHERE snapshot_id = ?1 ORDER BY id",
        )?;
        let snapshots = stmt
            .query_map([snapshot_id.as_str()], row_to_snapshot)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(snapshots)
    }

    pub fn count_snapshot_passes(&self) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT snapshot_id) FROM song_snapshots",
            [],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}
