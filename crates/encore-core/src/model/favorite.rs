use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{FavoriteId, SongId, UserId};

/// A song saved by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Favorite {
    pub id: FavoriteId,
    pub user_id: UserId,
    pub song_id: SongId,
    pub added_at: DateTime<Utc>,
}

impl Favorite {
    #[must_use]
    pub fn new(user_id: UserId, song_id: SongId) -> Self {
        Self {
            id: FavoriteId::new(),
            user_id,
            song_id,
            added_at: Utc::now(),
        }
    }
}

/// Result of saving a favorite.
///
/// A duplicate is an expected outcome the client reacts to, so it is a
/// variant here rather than an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FavoriteOutcome {
    Added(Favorite),
    AlreadyExists,
}

impl FavoriteOutcome {
    #[must_use]
    pub const fn is_added(&self) -> bool {
        matches!(self, Self::Added(_))
    }
}
