use std::collections::HashSet;

use rusqlite::ErrorCode;

use crate::error::{Error, Result};
use crate::model::{Favorite, FavoriteId, FavoriteOutcome, Song, SongId, UserId};

use super::db::{time_at, uuid_at, Database};
use super::songs::{row_to_song_at, SONG_COLUMNS};

fn row_to_favorite(row: &rusqlite::Row) -> rusqlite::Result<Favorite> {
    Ok(Favorite {
        id: FavoriteId::from_uuid(uuid_at(row, 0)?),
        user_id: UserId::from_uuid(uuid_at(row, 1)?),
        song_id: SongId::from_uuid(uuid_at(row, 2)?),
        added_at: time_at(row, 3)?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

// Favorite CRUD
impl Database {
    /// Save a song for a user.
    ///
    /// The (user, song) uniqueness constraint turns a repeated save into
    /// [`FavoriteOutcome::AlreadyExists`]. Unknown users or songs are
    /// [`Error::NotFound`].
    pub fn add_favorite(&self, user_id: &UserId, song_id: &SongId) -> Result<FavoriteOutcome> {
        self.require_user(user_id)?;
        self.require_song(song_id)?;

        let favorite = Favorite::new(*user_id, *song_id);
        let inserted = self.conn.execute(
            "INSERT INTO favorites (id, user_id, song_id, added_at) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                favorite.id.to_string(),
                favorite.user_id.to_string(),
                favorite.song_id.to_string(),
                favorite.added_at.to_rfc3339(),
            ],
        );

        match inserted {
            Ok(_) => Ok(FavoriteOutcome::Added(favorite)),
            Err(e) if is_unique_violation(&e) => Ok(FavoriteOutcome::AlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a favorite. Returns `false` if it did not exist.
    pub fn remove_favorite(&self, id: &FavoriteId) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM favorites WHERE id = ?1", [id.to_string()])?;
        Ok(changed > 0)
    }

    /// A user's favorites, oldest first.
    pub fn list_favorites(&self, user_id: &UserId) -> Result<Vec<Favorite>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, song_id, added_at FROM favorites
             WHERE user_id = ?1 ORDER BY added_at, rowid",
        )?;
        let favorites = stmt
            .query_map([user_id.to_string()], row_to_favorite)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(favorites)
    }

    /// A user's favorites joined with their songs, newest first.
    pub fn list_favorites_with_songs(&self, user_id: &UserId) -> Result<Vec<(Favorite, Song)>> {
        let song_columns = SONG_COLUMNS
            .split(',')
            .map(|c| format!("s.{}", c.trim()))
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT f.id, f.user_id, f.song_id, f.added_at, {song_columns}
             FROM favorites f JOIN songs s ON s.id = f.song_id
             WHERE f.user_id = ?1 ORDER BY f.added_at DESC, f.rowid DESC"
        ))?;
        let rows = stmt
            .query_map([user_id.to_string()], |row| {
                let favorite = row_to_favorite(row)?;
                let song = row_to_song_at(row, 4)?;
                Ok((favorite, song))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Ids of every song the user has saved.
    pub fn favorite_song_ids(&self, user_id: &UserId) -> Result<HashSet<SongId>> {
        Ok(self
            .list_favorites(user_id)?
            .into_iter()
            .map(|f| f.song_id)
            .collect())
    }

    pub fn count_favorites(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM favorites", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::User;

    fn seed(db: &Database) -> (User, Song) {
        let mut user = User::new(None, None);
        db.insert_user(&mut user).unwrap();
        let song = Song::new("dz-1", "Yellow", "Coldplay");
        db.insert_song(&song).unwrap();
        (user, song)
    }

    #[test]
    fn test_add_favorite() {
        let db = Database::open_in_memory().unwrap();
        let (user, song) = seed(&db);

        let outcome = db.add_favorite(&user.id, &song.id).unwrap();
        assert!(outcome.is_added());
        assert_eq!(db.count_favorites().unwrap(), 1);
        assert!(db.favorite_song_ids(&user.id).unwrap().contains(&song.id));
    }

    #[test]
    fn test_duplicate_favorite_is_distinct_outcome() {
        let db = Database::open_in_memory().unwrap();
        let (user, song) = seed(&db);

        db.add_favorite(&user.id, &song.id).unwrap();
        let second = db.add_favorite(&user.id, &song.id).unwrap();
        assert_eq!(second, FavoriteOutcome::AlreadyExists);
        assert_eq!(db.count_favorites().unwrap(), 1);
    }

    #[test]
    fn test_favorite_unknown_song_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let (user, _) = seed(&db);
        let err = db.add_favorite(&user.id, &SongId::new()).unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "song", .. }));
    }

    #[test]
    fn test_favorite_unknown_user_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let (_, song) = seed(&db);
        let err = db.add_favorite(&UserId::new(), &song.id).unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "user", .. }));
    }

    #[test]
    fn test_list_favorites_with_songs_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let (user, first) = seed(&db);
        let second = Song::new("dz-2", "Creep", "Radiohead");
        db.insert_song(&second).unwrap();

        db.add_favorite(&user.id, &first.id).unwrap();
        db.add_favorite(&user.id, &second.id).unwrap();

        let rows = db.list_favorites_with_songs(&user.id).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].1.title, "Creep");
        assert_eq!(rows[1].1.title, "Yellow");

        let oldest_first = db.list_favorites(&user.id).unwrap();
        assert_eq!(oldest_first[0].song_id, first.id);
    }

    #[test]
    fn test_remove_favorite() {
        let db = Database::open_in_memory().unwrap();
        let (user, song) = seed(&db);
        let FavoriteOutcome::Added(favorite) = db.add_favorite(&user.id, &song.id).unwrap() else {
            panic!("expected a new favorite");
        };

        assert!(db.remove_favorite(&favorite.id).unwrap());
        assert!(!db.remove_favorite(&favorite.id).unwrap());
        assert!(db.favorite_song_ids(&user.id).unwrap().is_empty());
    }
}
