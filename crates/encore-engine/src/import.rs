//! Catalog import from normalised JSON records.
//!
//! Accepts either a bare array of songs or an object with a `songs` array.
//! Songs are upserted by external id, so re-importing a file refreshes
//! metadata without resetting view counters.

use std::path::Path;

use serde::{Deserialize, Serialize};

use encore_core::model::Song;
use encore_core::schema::Database;
use encore_core::Error;

use crate::error::EngineResult;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SongFile {
    Bare(Vec<Song>),
    Wrapped { songs: Vec<Song> },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
}

/// Parse songs from a JSON document.
///
/// # Errors
///
/// Returns a serialization error for malformed JSON.
pub fn parse_songs(json: &str) -> encore_core::Result<Vec<Song>> {
    let file: SongFile = serde_json::from_str(json)?;
    Ok(match file {
        SongFile::Bare(songs) | SongFile::Wrapped { songs } => songs,
    })
}

fn validate(song: &Song) -> encore_core::Result<()> {
    for (field, value) in [
        ("external_id", &song.external_id),
        ("title", &song.title),
        ("artist", &song.artist),
    ] {
        if value.trim().is_empty() {
            return Err(Error::InvalidData(format!("song is missing {field}")));
        }
    }
    Ok(())
}

/// Upsert songs into the catalog. Invalid records are skipped.
///
/// # Errors
///
/// Returns a database error if a valid song cannot be stored.
pub fn import_songs(db: &Database, songs: &[Song]) -> EngineResult<ImportReport> {
    let mut report = ImportReport::default();
    for song in songs {
        if let Err(e) = validate(song) {
            log::warn!("Skipping song {:?}: {e}", song.external_id);
            report.skipped += 1;
            continue;
        }
        let existed = db.get_song_by_external_id(&song.external_id)?.is_some();
        db.upsert_song(song)?;
        if existed {
            report.updated += 1;
        } else {
            report.inserted += 1;
        }
    }
    log::info!(
        "Imported songs: {} new, {} updated, {} skipped",
        report.inserted,
        report.updated,
        report.skipped
    );
    Ok(report)
}

/// Read a JSON file and import its songs.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read, a serialization error
/// if it is malformed, or a database error.
pub fn import_file(db: &Database, path: &Path) -> EngineResult<ImportReport> {
    let json = std::fs::read_to_string(path).map_err(Error::from)?;
    let songs = parse_songs(&json)?;
    import_songs(db, &songs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_and_wrapped() {
        let bare = r#"[{"external_id": "dz-1", "title": "Yellow", "artist": "Coldplay"}]"#;
        let wrapped = r#"{"songs": [{"external_id": "dz-1", "title": "Yellow",
            "artist": "Coldplay", "genre": "Rock", "rank": 900000}]}"#;

        assert_eq!(parse_songs(bare).unwrap().len(), 1);
        let songs = parse_songs(wrapped).unwrap();
        assert_eq!(songs[0].genre.as_deref(), Some("Rock"));
        assert_eq!(songs[0].rank, Some(900_000));
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(matches!(
            parse_songs("{not json"),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_reimport_updates_and_keeps_counter() {
        let db = Database::open_in_memory().unwrap();
        let song = Song::new("dz-1", "Yellow", "Coldplay");
        let first = import_songs(&db, std::slice::from_ref(&song)).unwrap();
        assert_eq!(first.inserted, 1);

        let stored = db.get_song_by_external_id("dz-1").unwrap().unwrap();
        db.record_view(&stored.id).unwrap();

        let refreshed = Song::new("dz-1", "Yellow (Remastered)", "Coldplay");
        let second = import_songs(&db, &[refreshed]).unwrap();
        assert_eq!(second.updated, 1);

        let stored = db.require_song(&stored.id).unwrap();
        assert_eq!(stored.title, "Yellow (Remastered)");
        assert_eq!(stored.counter, 1);
    }

    #[test]
    fn test_invalid_records_skipped() {
        let db = Database::open_in_memory().unwrap();
        let songs = vec![
            Song::new("", "Nameless", "Nobody"),
            Song::new("dz-2", "Creep", "Radiohead"),
        ];
        let report = import_songs(&db, &songs).unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.inserted, 1);
        assert_eq!(db.count_songs().unwrap(), 1);
    }
}
