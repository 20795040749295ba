use anyhow::Result;
use encore_core::model::{FavoriteId, FavoriteOutcome, SongId, UserId};
use encore_core::schema::Database;

use super::{print_json, song_line};

pub fn add_favorite(db: &Database, user_id: &UserId, song_id: &SongId) -> Result<()> {
    match db.add_favorite(user_id, song_id)? {
        FavoriteOutcome::Added(favorite) => println!("✓ Saved (favorite {})", favorite.id),
        FavoriteOutcome::AlreadyExists => println!("Song is already in favorites"),
    }
    Ok(())
}

pub fn list_favorites(db: &Database, user_id: &UserId, json: bool) -> Result<()> {
    db.require_user(user_id)?;
    let favorites = db.list_favorites_with_songs(user_id)?;

    if json {
        let songs: Vec<_> = favorites
            .iter()
            .map(|(favorite, song)| {
                serde_json::json!({
                    "id": favorite.id,
                    "added_at": favorite.added_at,
                    "song": song,
                })
            })
            .collect();
        return print_json(&songs);
    }

    if favorites.is_empty() {
        println!("No favorites yet.");
        return Ok(());
    }

    println!("\n❤ {} favorites\n", favorites.len());
    for (favorite, song) in &favorites {
        println!(
            "  {}  {}  (saved {})",
            favorite.id,
            song_line(song),
            favorite.added_at.format("%Y-%m-%d")
        );
    }

    Ok(())
}

pub fn remove_favorite(db: &Database, favorite_id: &FavoriteId) -> Result<()> {
    if db.remove_favorite(favorite_id)? {
        println!("✓ Removed from favorites");
    } else {
        anyhow::bail!("Favorite not found: {favorite_id}");
    }
    Ok(())
}
