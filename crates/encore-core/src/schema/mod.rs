//! SQLite persistence: migrations and the [`Database`] store.

mod db;
mod favorites;
pub mod migrations;
mod snapshots;
mod songs;
mod users;

pub use db::Database;
pub use snapshots::SnapshotPass;
