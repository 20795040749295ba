use rusqlite::OptionalExtension;

use crate::error::{Error, Result};
use crate::model::{IndirectPreferences, User, UserId};

use super::db::{json_at, time_at, uuid_at, Database};

const USER_COLUMNS: &str = "id, display_name, email, preferred_genres, preferred_moods,
    onboarding_completed, indirect_preferences, effective_genres, created_at";

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: UserId::from_uuid(uuid_at(row, 0)?),
        display_name: row.get(1)?,
        email: row.get(2)?,
        preferred_genres: json_at(row, 3)?,
        preferred_moods: json_at(row, 4)?,
        onboarding_completed: row.get(5)?,
        indirect_preferences: json_at(row, 6)?,
        effective_genres: json_at(row, 7)?,
        created_at: time_at(row, 8)?,
    })
}

// User CRUD. Saving always recomputes the derived effective genres.
impl Database {
    /// Insert a new user.
    pub fn insert_user(&self, user: &mut User) -> Result<()> {
        user.refresh_effective_genres();
        self.conn.execute(
            &format!("INSERT INTO users ({USER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
            rusqlite::params![
                user.id.to_string(),
                user.display_name,
                user.email,
                serde_json::to_string(&user.preferred_genres)?,
                serde_json::to_string(&user.preferred_moods)?,
                user.onboarding_completed,
                serde_json::to_string(&user.indirect_preferences)?,
                serde_json::to_string(&user.effective_genres)?,
                user.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Update an existing user.
    pub fn update_user(&self, user: &mut User) -> Result<()> {
        user.refresh_effective_genres();
        let changed = self.conn.execute(
            "UPDATE users SET
                display_name = ?2, email = ?3, preferred_genres = ?4,
                preferred_moods = ?5, onboarding_completed = ?6,
                indirect_preferences = ?7, effective_genres = ?8
             WHERE id = ?1",
            rusqlite::params![
                user.id.to_string(),
                user.display_name,
                user.email,
                serde_json::to_string(&user.preferred_genres)?,
                serde_json::to_string(&user.preferred_moods)?,
                user.onboarding_completed,
                serde_json::to_string(&user.indirect_preferences)?,
                serde_json::to_string(&user.effective_genres)?,
            ],
        )?;
        if changed == 0 {
            return Err(Error::not_found("user", user.id));
        }
        Ok(())
    }

    /// Get a user by id.
    pub fn get_user(&self, id: &UserId) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                [id.to_string()],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Get a user by id, failing with [`Error::NotFound`] if it is missing.
    pub fn require_user(&self, id: &UserId) -> Result<User> {
        self.get_user(id)?.ok_or_else(|| Error::not_found("user", id))
    }

    pub fn count_users(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Complete onboarding: replace genres and moods and mark the user as
    /// onboarded.
    pub fn complete_onboarding(
        &self,
        id: &UserId,
        genres: Vec<String>,
        moods: Vec<String>,
    ) -> Result<User> {
        let mut user = self.require_user(id)?;
        user.preferred_genres = genres;
        user.preferred_moods = moods;
        user.onboarding_completed = true;
        self.update_user(&mut user)?;
        log::info!(
            "User {} completed onboarding with genres {:?}",
            user.id,
            user.preferred_genres
        );
        Ok(user)
    }

    /// Replace only the preference lists that are given.
    pub fn update_preferences(
        &self,
        id: &UserId,
        genres: Option<Vec<String>>,
        moods: Option<Vec<String>>,
    ) -> Result<User> {
        let mut user = self.require_user(id)?;
        if let Some(genres) = genres {
            user.preferred_genres = genres;
        }
        if let Some(moods) = moods {
            user.preferred_moods = moods;
        }
        self.update_user(&mut user)?;
        Ok(user)
    }

    /// Record newly detected indirect preferences.
    pub fn set_indirect_preferences(
        &self,
        id: &UserId,
        indirect: IndirectPreferences,
    ) -> Result<User> {
        let mut user = self.require_user(id)?;
        user.indirect_preferences = indirect;
        self.update_user(&mut user)?;
        Ok(user)
    }
}
