pub mod favorite;
pub mod ids;
pub mod snapshot;
pub mod song;
pub mod user;

pub use favorite::{Favorite, FavoriteOutcome};
pub use ids::{FavoriteId, SongId, UserId};
pub use snapshot::{SnapshotId, SongSnapshot};
pub use song::{LastFmData, MusicBrainzData, Rating, SimilarTrack, Song, YoutubeData};
pub use user::{IndirectPreferences, OnboardingStatus, PreferenceSource, User};
