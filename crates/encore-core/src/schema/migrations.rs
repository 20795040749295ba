/// A schema migration.
#[derive(Debug)]
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub sql: &'static str,
}

const MIGRATION_001: &str = r#"
-- Catalog songs
CREATE TABLE IF NOT EXISTS songs (
    id TEXT PRIMARY KEY,
    external_id TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    artist TEXT NOT NULL,
    album TEXT,
    preview_url TEXT,
    cover_url TEXT,
    duration_secs INTEGER,
    release_date TEXT,
    genre TEXT,
    catalog_rank INTEGER,
    popularity REAL,
    counter INTEGER NOT NULL DEFAULT 0,
    last_viewed_at TEXT,
    lastfm_data TEXT,
    youtube_data TEXT,
    musicbrainz_data TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_songs_catalog_rank ON songs(catalog_rank DESC, popularity DESC);
CREATE INDEX IF NOT EXISTS idx_songs_artist ON songs(artist);

-- Users and their preferences (list/record fields are JSON)
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    display_name TEXT,
    email TEXT,
    preferred_genres TEXT NOT NULL DEFAULT '[]',
    preferred_moods TEXT NOT NULL DEFAULT '[]',
    onboarding_completed INTEGER NOT NULL DEFAULT 0,
    indirect_preferences TEXT NOT NULL DEFAULT '{}',
    effective_genres TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);

-- Favorites: one row per (user, song)
CREATE TABLE IF NOT EXISTS favorites (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id),
    song_id TEXT NOT NULL REFERENCES songs(id),
    added_at TEXT NOT NULL,
    UNIQUE (user_id, song_id)
);

CREATE INDEX IF NOT EXISTS idx_favorites_user_id ON favorites(user_id);

-- Popularity snapshots (append-only)
CREATE TABLE IF NOT EXISTS song_snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    song_id TEXT NOT NULL REFERENCES songs(id),
    counter INTEGER NOT NULL,
    score REAL NOT NULL,
    snapshot_id TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_song_snapshots_snapshot_id ON song_snapshots(snapshot_id);
"#;

pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: MIGRATION_001,
}];
