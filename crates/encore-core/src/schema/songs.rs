use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::model::{LastFmData, Song, SongId};

use super::db::{
    fold_case, normalize_terms, opt_json_at, opt_time_at, time_at, to_sql_int, u64_at, uuid_at,
    Database,
};

pub(super) const SONG_COLUMNS: &str = "id, external_id, title, artist, album, preview_url,
    cover_url, duration_secs, release_date, genre, catalog_rank, popularity, counter,
    last_viewed_at, lastfm_data, youtube_data, musicbrainz_data, created_at, updated_at";

/// Popularity order used by every candidate query.
const POPULARITY_ORDER: &str = "catalog_rank DESC, popularity DESC, rowid";

pub(super) fn row_to_song(row: &rusqlite::Row) -> rusqlite::Result<Song> {
    row_to_song_at(row, 0)
}

/// Decode a song whose [`SONG_COLUMNS`] start at column `o`.
pub(super) fn row_to_song_at(row: &rusqlite::Row, o: usize) -> rusqlite::Result<Song> {
    Ok(Song {
        id: SongId::from_uuid(uuid_at(row, o)?),
        external_id: row.get(o + 1)?,
        title: row.get(o + 2)?,
        artist: row.get(o + 3)?,
        album: row.get(o + 4)?,
        preview_url: row.get(o + 5)?,
        cover_url: row.get(o + 6)?,
        duration_secs: row
            .get::<_, Option<i64>>(o + 7)?
            .and_then(|v| u32::try_from(v).ok()),
        release_date: row.get(o + 8)?,
        genre: row.get(o + 9)?,
        rank: row.get(o + 10)?,
        popularity: row.get(o + 11)?,
        counter: u64_at(row, o + 12)?,
        last_viewed_at: opt_time_at(row, o + 13)?,
        lastfm: opt_json_at(row, o + 14)?,
        youtube: opt_json_at(row, o + 15)?,
        musicbrainz: opt_json_at(row, o + 16)?,
        created_at: time_at(row, o + 17)?,
        updated_at: time_at(row, o + 18)?,
    })
}

pub(super) fn list_songs_on(conn: &Connection) -> Result<Vec<Song>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SONG_COLUMNS} FROM songs ORDER BY {POPULARITY_ORDER}"
    ))?;
    let songs = stmt
        .query_map([], row_to_song)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(songs)
}

fn opt_json<T: serde::Serialize>(value: Option<&T>) -> Result<Option<String>> {
    Ok(value.map(serde_json::to_string).transpose()?)
}

// Song CRUD
impl Database {
    /// Insert a new song. Fails if the external id is already present.
    pub fn insert_song(&self, song: &Song) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO songs ({SONG_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)"
            ),
            rusqlite::params![
                song.id.to_string(),
                song.external_id,
                song.title,
                song.artist,
                song.album,
                song.preview_url,
                song.cover_url,
                song.duration_secs.map(i64::from),
                song.release_date,
                song.genre,
                song.rank,
                song.popularity,
                to_sql_int(song.counter),
                song.last_viewed_at.map(|t| t.to_rfc3339()),
                opt_json(song.lastfm.as_ref())?,
                opt_json(song.youtube.as_ref())?,
                opt_json(song.musicbrainz.as_ref())?,
                song.created_at.to_rfc3339(),
                song.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Insert a song, or refresh catalog metadata of the song with the same
    /// external id. The interaction counter of an existing song is kept.
    ///
    /// Returns the id of the stored song.
    pub fn upsert_song(&self, song: &Song) -> Result<SongId> {
        self.conn.execute(
            &format!(
                "INSERT INTO songs ({SONG_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
                 ON CONFLICT(external_id) DO UPDATE SET
                    title = excluded.title, artist = excluded.artist,
                    album = excluded.album, preview_url = excluded.preview_url,
                    cover_url = excluded.cover_url, duration_secs = excluded.duration_secs,
                    release_date = excluded.release_date, genre = excluded.genre,
                    catalog_rank = excluded.catalog_rank, popularity = excluded.popularity,
                    lastfm_data = COALESCE(excluded.lastfm_data, songs.lastfm_data),
                    youtube_data = COALESCE(excluded.youtube_data, songs.youtube_data),
                    musicbrainz_data = COALESCE(excluded.musicbrainz_data, songs.musicbrainz_data),
                    updated_at = excluded.updated_at"
            ),
            rusqlite::params![
                song.id.to_string(),
                song.external_id,
                song.title,
                song.artist,
                song.album,
                song.preview_url,
                song.cover_url,
                song.duration_secs.map(i64::from),
                song.release_date,
                song.genre,
                song.rank,
                song.popularity,
                to_sql_int(song.counter),
                song.last_viewed_at.map(|t| t.to_rfc3339()),
                opt_json(song.lastfm.as_ref())?,
                opt_json(song.youtube.as_ref())?,
                opt_json(song.musicbrainz.as_ref())?,
                song.created_at.to_rfc3339(),
                song.updated_at.to_rfc3339(),
            ],
        )?;

        self.get_song_by_external_id(&song.external_id)?
            .map(|s| s.id)
            .ok_or_else(|| Error::not_found("song", &song.external_id))
    }

    /// Get a song by id.
    pub fn get_song(&self, id: &SongId) -> Result<Option<Song>> {
        let song = self
            .conn
            .query_row(
                &format!("SELECT {SONG_COLUMNS} FROM songs WHERE id = ?1"),
                [id.to_string()],
                row_to_song,
            )
            .optional()?;
        Ok(song)
    }

    /// Get a song by id, failing with [`Error::NotFound`] if it is missing.
    pub fn require_song(&self, id: &SongId) -> Result<Song> {
        self.get_song(id)?.ok_or_else(|| Error::not_found("song", id))
    }

    /// Get a song by its external catalog id.
    pub fn get_song_by_external_id(&self, external_id: &str) -> Result<Option<Song>> {
        let song = self
            .conn
            .query_row(
                &format!("SELECT {SONG_COLUMNS} FROM songs WHERE external_id = ?1"),
                [external_id],
                row_to_song,
            )
            .optional()?;
        Ok(song)
    }

    /// List every song, most popular first.
    pub fn list_songs(&self) -> Result<Vec<Song>> {
        list_songs_on(&self.conn)
    }

    /// List one page of songs, most popular first.
    pub fn list_songs_page(&self, limit: usize, offset: usize) -> Result<Vec<Song>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SONG_COLUMNS} FROM songs ORDER BY {POPULARITY_ORDER} LIMIT ?1 OFFSET ?2"
        ))?;
        let songs = stmt
            .query_map(
                rusqlite::params![to_sql_int(limit as u64), to_sql_int(offset as u64)],
                row_to_song,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(songs)
    }

    /// List songs that were never enriched from Last.fm.
    pub fn list_songs_missing_lastfm(&self, limit: usize) -> Result<Vec<Song>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SONG_COLUMNS} FROM songs WHERE lastfm_data IS NULL
             ORDER BY {POPULARITY_ORDER} LIMIT ?1"
        ))?;
        let songs = stmt
            .query_map([to_sql_int(limit as u64)], row_to_song)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(songs)
    }

    pub fn count_songs(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM songs", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Count a view: bump the interaction counter and the last-viewed time.
    ///
    /// Returns the new counter value.
    pub fn record_view(&self, id: &SongId) -> Result<u64> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE songs SET counter = counter + 1, last_viewed_at = ?2, updated_at = ?2
             WHERE id = ?1",
            rusqlite::params![id.to_string(), now],
        )?;
        if changed == 0 {
            return Err(Error::not_found("song", id));
        }
        Ok(self.require_song(id)?.counter)
    }

    /// Replace the Last.fm sub-record of a song.
    pub fn update_lastfm_data(&self, id: &SongId, data: &LastFmData) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE songs SET lastfm_data = ?2, updated_at = ?3 WHERE id = ?1",
            rusqlite::params![
                id.to_string(),
                serde_json::to_string(data)?,
                Utc::now().to_rfc3339()
            ],
        )?;
        if changed == 0 {
            return Err(Error::not_found("song", id));
        }
        Ok(())
    }
}

// Candidate matching. Every matcher is a case-insensitive substring match
// ordered by popularity.
impl Database {
    /// Songs whose structured genre contains any of `genres`.
    pub fn find_songs_by_genre_field<S: AsRef<str>>(
        &self,
        genres: &[S],
        limit: usize,
    ) -> Result<Vec<Song>> {
        self.find_songs_matching("instr(fold_case(genre), ?) > 0", genres, limit)
    }

    /// Songs with a Last.fm tag containing any of `genres`.
    pub fn find_songs_by_tag<S: AsRef<str>>(&self, genres: &[S], limit: usize) -> Result<Vec<Song>> {
        self.find_songs_matching(
            "EXISTS (SELECT 1 FROM json_each(songs.lastfm_data, '$.tags') AS tag
                     WHERE instr(fold_case(tag.value), ?) > 0)",
            genres,
            limit,
        )
    }

    /// Songs whose artist contains any of `artists`.
    pub fn find_songs_by_artists<S: AsRef<str>>(
        &self,
        artists: &[S],
        limit: usize,
    ) -> Result<Vec<Song>> {
        self.find_songs_matching("instr(fold_case(artist), ?) > 0", artists, limit)
    }

    /// First song (in insertion order) whose title and artist contain the
    /// given values.
    pub fn find_song_by_title_and_artist(&self, title: &str, artist: &str) -> Result<Option<Song>> {
        let (title, artist) = (fold_case(title.trim()), fold_case(artist.trim()));
        if title.is_empty() || artist.is_empty() {
            return Ok(None);
        }
        let song = self
            .conn
            .query_row(
                &format!(
                    "SELECT {SONG_COLUMNS} FROM songs
                     WHERE instr(fold_case(title), ?1) > 0 AND instr(fold_case(artist), ?2) > 0
                     ORDER BY rowid LIMIT 1"
                ),
                [title, artist],
                row_to_song,
            )
            .optional()?;
        Ok(song)
    }

    /// Run `predicate` (one `?` placeholder) OR-ed once per term.
    fn find_songs_matching<S: AsRef<str>>(
        &self,
        predicate: &str,
        terms: &[S],
        limit: usize,
    ) -> Result<Vec<Song>> {
        let terms = normalize_terms(terms);
        if terms.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let clause = vec![format!("({predicate})"); terms.len()].join(" OR ");
        let sql = format!(
            "SELECT {SONG_COLUMNS} FROM songs WHERE {clause} ORDER BY {POPULARITY_ORDER} LIMIT ?"
        );

        let mut params: Vec<Value> = terms.into_iter().map(Value::Text).collect();
        params.push(Value::Integer(to_sql_int(limit as u64)));

        let mut stmt = self.conn.prepare(&sql)?;
        let songs = stmt
            .query_map(params_from_iter(params), row_to_song)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(songs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MusicBrainzData, Rating};

    fn tagged(external_id: &str, title: &str, artist: &str, tags: &[&str]) -> Song {
        Song::new(external_id, title, artist).with_lastfm(LastFmData {
            tags: tags.iter().map(|t| (*t).to_string()).collect(),
            ..LastFmData::default()
        })
    }

    #[test]
    fn test_song_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let song = Song::new("dz-1", "Yellow", "Coldplay")
            .with_genre("Alternative Rock")
            .with_rank(900_000)
            .with_popularity(81.0)
            .with_musicbrainz(MusicBrainzData {
                rating: Some(Rating {
                    value: 4.0,
                    votes: 3,
                }),
                ..MusicBrainzData::default()
            });

        db.insert_song(&song).unwrap();

        let loaded = db.get_song(&song.id).unwrap().unwrap();
        assert_eq!(loaded.title, "Yellow");
        assert_eq!(loaded.genre.as_deref(), Some("Alternative Rock"));
        assert_eq!(loaded.rank, Some(900_000));
        assert!((loaded.rating_value() - 4.0).abs() < f64::EPSILON);
        assert!(loaded.lastfm.is_none());
    }

    #[test]
    fn test_duplicate_external_id_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.insert_song(&Song::new("dz-1", "Yellow", "Coldplay"))
            .unwrap();
        assert!(db
            .insert_song(&Song::new("dz-1", "Other", "Someone"))
            .is_err());
    }

    #[test]
    fn test_upsert_keeps_id_and_counter() {
        let db = Database::open_in_memory().unwrap();
        let original = Song::new("dz-1", "Yellow", "Coldplay");
        db.insert_song(&original).unwrap();
        db.record_view(&original.id).unwrap();

        let refreshed = Song::new("dz-1", "Yellow (Remastered)", "Coldplay").with_rank(5);
        let id = db.upsert_song(&refreshed).unwrap();

        assert_eq!(id, original.id);
        let loaded = db.require_song(&id).unwrap();
        assert_eq!(loaded.title, "Yellow (Remastered)");
        assert_eq!(loaded.counter, 1);
        assert_eq!(db.count_songs().unwrap(), 1);
    }

    #[test]
    fn test_require_missing_song_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let err = db.require_song(&SongId::new()).unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "song", .. }));
    }

    #[test]
    fn test_record_view_increments_counter() {
        let db = Database::open_in_memory().unwrap();
        let song = Song::new("dz-1", "Yellow", "Coldplay");
        db.insert_song(&song).unwrap();

        assert_eq!(db.record_view(&song.id).unwrap(), 1);
        assert_eq!(db.record_view(&song.id).unwrap(), 2);
        assert!(db.require_song(&song.id).unwrap().last_viewed_at.is_some());
        assert!(db.record_view(&SongId::new()).is_err());
    }

    #[test]
    fn test_genre_match_is_case_insensitive_substring_by_rank() {
        let db = Database::open_in_memory().unwrap();
        db.insert_song(&Song::new("1", "A", "X").with_genre("Indie Rock").with_rank(10))
            .unwrap();
        db.insert_song(&Song::new("2", "B", "Y").with_genre("ROCK").with_rank(50))
            .unwrap();
        db.insert_song(&Song::new("3", "C", "Z").with_genre("Jazz").with_rank(99))
            .unwrap();

        let songs = db.find_songs_by_genre_field(&["rock"], 80).unwrap();
        let titles: Vec<_> = songs.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, ["B", "A"]);
    }

    #[test]
    fn test_genre_match_multiple_terms_and_limit() {
        let db = Database::open_in_memory().unwrap();
        for i in 0..5 {
            db.insert_song(
                &Song::new(format!("r{i}"), format!("Rock {i}"), "X")
                    .with_genre("Rock")
                    .with_rank(i),
            )
            .unwrap();
        }
        db.insert_song(&Song::new("j", "Jazz", "Y").with_genre("Jazz").with_rank(100))
            .unwrap();

        let songs = db.find_songs_by_genre_field(&["Rock", "jazz"], 3).unwrap();
        assert_eq!(songs.len(), 3);
        assert_eq!(songs[0].title, "Jazz");
    }

    #[test]
    fn test_blank_terms_match_nothing() {
        let db = Database::open_in_memory().unwrap();
        db.insert_song(&Song::new("1", "A", "X").with_genre("Rock"))
            .unwrap();
        assert!(db.find_songs_by_genre_field(&["  "], 80).unwrap().is_empty());
        assert!(db
            .find_songs_by_artists::<&str>(&[], 80)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_tag_match() {
        let db = Database::open_in_memory().unwrap();
        db.insert_song(&tagged("1", "A", "X", &["post-rock", "ambient"]))
            .unwrap();
        db.insert_song(&tagged("2", "B", "Y", &["jazz"])).unwrap();
        db.insert_song(&Song::new("3", "C", "Z")).unwrap();

        let songs = db.find_songs_by_tag(&["Rock"], 80).unwrap();
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].title, "A");
    }

    #[test]
    fn test_artist_match() {
        let db = Database::open_in_memory().unwrap();
        db.insert_song(&Song::new("1", "Do I Wanna Know?", "Arctic Monkeys"))
            .unwrap();
        db.insert_song(&Song::new("2", "Yellow", "Coldplay")).unwrap();

        let songs = db.find_songs_by_artists(&["arctic"], 80).unwrap();
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].artist, "Arctic Monkeys");
    }

    #[test]
    fn test_find_by_title_and_artist() {
        let db = Database::open_in_memory().unwrap();
        db.insert_song(&Song::new("1", "Fix You (Live)", "Coldplay"))
            .unwrap();

        let found = db
            .find_song_by_title_and_artist("fix you", "COLDPLAY")
            .unwrap();
        assert!(found.is_some());
        assert!(db
            .find_song_by_title_and_artist("fix you", "Muse")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_matching_folds_non_ascii_case() {
        let db = Database::open_in_memory().unwrap();
        let song =
            tagged("dz-9", "Élan", "Édith Piaf", &["Chanson Française"]).with_genre("Électro");
        db.insert_song(&song).unwrap();

        let found = db
            .find_song_by_title_and_artist("Élan", "Édith Piaf")
            .unwrap()
            .expect("identical title and artist should match");
        assert_eq!(found.id, song.id);
        assert!(db
            .find_song_by_title_and_artist("élan", "ÉDITH")
            .unwrap()
            .is_some());

        assert_eq!(db.find_songs_by_artists(&["Édith Piaf"], 80).unwrap().len(), 1);
        assert_eq!(db.find_songs_by_artists(&["édith"], 80).unwrap().len(), 1);
        assert_eq!(db.find_songs_by_genre_field(&["Électro"], 80).unwrap().len(), 1);
        assert_eq!(db.find_songs_by_genre_field(&["ÉLECTRO"], 80).unwrap().len(), 1);
        assert_eq!(db.find_songs_by_tag(&["FRANÇAISE"], 80).unwrap().len(), 1);
    }

    #[test]
    fn test_update_lastfm_data_and_missing_list() {
        let db = Database::open_in_memory().unwrap();
        let song = Song::new("1", "A", "X");
        db.insert_song(&song).unwrap();
        assert_eq!(db.list_songs_missing_lastfm(10).unwrap().len(), 1);

        let data = LastFmData {
            playcount: 10,
            listeners: 2,
            tags: vec!["rock".to_string()],
            ..LastFmData::default()
        };
        db.update_lastfm_data(&song.id, &data).unwrap();

        assert!(db.list_songs_missing_lastfm(10).unwrap().is_empty());
        assert_eq!(db.require_song(&song.id).unwrap().lastfm, Some(data));
    }

    #[test]
    fn test_list_songs_page() {
        let db = Database::open_in_memory().unwrap();
        for i in 0..5 {
            db.insert_song(&Song::new(format!("{i}"), format!("S{i}"), "X").with_rank(i))
                .unwrap();
        }
        let page = db.list_songs_page(2, 1).unwrap();
        let titles: Vec<_> = page.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, ["S3", "S2"]);
    }
}
