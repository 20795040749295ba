use anyhow::{Context, Result};
use encore_core::model::SongId;
use encore_core::schema::Database;
use encore_engine::{similar_to_song, Config};

use super::{lastfm_client, print_json, song_line};

/// Print one page of the catalog. Pages start at 1.
pub fn list_songs(db: &Database, page: usize, limit: usize, json: bool) -> Result<()> {
    let page = page.max(1);
    let songs = db.list_songs_page(limit, page_offset(page, limit))?;
    if json {
        return print_json(&songs);
    }

    let total = db.count_songs()?;
    let pages = if limit == 0 { 0 } else { total.div_ceil(limit as u64) };
    if songs.is_empty() {
        println!("No songs on page {page} ({total} songs, {pages} pages).");
        return Ok(());
    }

    println!();
    for song in &songs {
        println!("  {}  {}", song.id, song_line(song));
    }
    println!("
  Page {page} of {pages} ({total} songs)");
    Ok(())
}

fn page_offset(page: usize, limit: usize) -> usize {
    page.saturating_sub(1).saturating_mul(limit)
}

pub fn show_song(db: &Database, song_id: &SongId) -> Result<()> {
    let song = db.require_song(song_id)?;

    println!("\n🎵 {}\n", song_line(&song));
    println!("  Id:          {}", song.id);
    println!("  External id: {}", song.external_id);
    if let Some(album) = &song.album {
        println!("  Album:       {album}");
    }
    if let Some(date) = &song.release_date {
        println!("  Released:    {date}");
    }
    if let Some(rank) = song.rank {
        println!("  Rank:        {rank}");
    }
    if let Some(popularity) = song.popularity {
        println!("  Popularity:  {popularity}");
    }
    println!("  Views:       {}", song.counter);

    if let Some(lastfm) = &song.lastfm {
        println!("\n  Last.fm: {} plays, {} listeners", lastfm.playcount, lastfm.listeners);
        if !lastfm.tags.is_empty() {
            println!("    Tags: {}", lastfm.tags.join(", "));
        }
        for track in &lastfm.similar_tracks {
            println!("    ~ {} - {} ({:.2})", track.name, track.artist, track.match_score);
        }
    }
    if let Some(youtube) = &song.youtube {
        println!("\n  YouTube: {} views, {} likes", youtube.views, youtube.likes);
    }
    if let Some(rating) = song.musicbrainz.as_ref().and_then(|mb| mb.rating) {
        println!("\n  MusicBrainz rating: {:.1}/5 ({} votes)", rating.value, rating.votes);
    }

    Ok(())
}

pub fn record_view(db: &Database, song_id: &SongId) -> Result<()> {
    let counter = db.record_view(song_id)?;
    println!("✓ Recorded view ({counter} total)");
    Ok(())
}

pub async fn show_similar(
    db: &Database,
    config: &Config,
    song_id: &SongId,
    limit: usize,
    json: bool,
) -> Result<()> {
    let Some(client) = lastfm_client(config)? else {
        anyhow::bail!("Similar tracks need a Last.fm API key (encore config set lastfm_api_key <KEY>)");
    };

    let matches = similar_to_song(db, &client, song_id, limit)
        .await
        .context("Similar track lookup failed")?;

    if json {
        return print_json(&matches);
    }

    if matches.is_empty() {
        println!("No similar tracks found. The song might be too new or not indexed.");
        return Ok(());
    }

    println!();
    for m in &matches {
        let marker = if m.in_catalog() { "●" } else { "○" };
        println!(
            "  {marker} {} - {} (match {:.2})",
            m.track.name, m.track.artist, m.track.match_score
        );
    }
    let in_catalog = matches.iter().filter(|m| m.in_catalog()).count();
    println!("\n  {in_catalog} of {} in the catalog", matches.len());

    Ok(())
}
