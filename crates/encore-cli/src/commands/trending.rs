use anyhow::Result;
use encore_core::schema::Database;
use encore_core::Error;
use encore_engine::{trending, EngineError, TrendWindow};

use super::{print_json, song_line};

pub fn show_trending(db: &Database, window: TrendWindow, json: bool) -> Result<()> {
    let entries = match trending(db, window) {
        Ok(entries) => entries,
        Err(EngineError::Core(Error::InsufficientData {
            required, available, ..
        })) => {
            println!(
                "Not enough snapshot passes for {window}: need {required}, have {available}."
            );
            println!("\nRun `encore snapshot` periodically to build history.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        return print_json(&entries);
    }

    let fallback = entries.iter().all(|e| e.delta.is_none());
    println!(
        "\n🔥 Trending ({window}){}\n",
        if fallback { " - no movement, top by score" } else { "" }
    );

    for (rank, entry) in entries.iter().enumerate() {
        match entry.delta {
            Some(delta) => println!(
                "  {:>2}. {:<50} score {:.4} ({delta:+.4})",
                rank + 1,
                song_line(&entry.song),
                entry.current_score
            ),
            None => println!(
                "  {:>2}. {:<50} score {:.4}",
                rank + 1,
                song_line(&entry.song),
                entry.current_score
            ),
        }
    }

    if entries.is_empty() {
        println!("  No songs in the latest snapshot.");
    }

    Ok(())
}
