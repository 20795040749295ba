use anyhow::Result;
use chrono::Utc;
use encore_core::model::{IndirectPreferences, PreferenceSource, User, UserId};
use encore_core::schema::Database;

use super::print_json;

pub fn add_user(db: &Database, name: Option<String>, email: Option<String>) -> Result<()> {
    let mut user = User::new(name, email);
    db.insert_user(&mut user)?;
    println!("✓ Created user {}", user.id);
    println!("\nNext: encore user prefs {} --genres rock,pop --complete", user.id);
    Ok(())
}

pub fn show_user(db: &Database, user_id: &UserId, json: bool) -> Result<()> {
    let user = db.require_user(user_id)?;
    if json {
        return print_json(&user);
    }

    println!("\n👤 {}\n", user.display_name.as_deref().unwrap_or("(unnamed)"));
    println!("  Id:         {}", user.id);
    if let Some(email) = &user.email {
        println!("  Email:      {email}");
    }
    println!("  Onboarded:  {}", if user.onboarding_completed { "yes" } else { "no" });
    println!("  Genres:     {}", list_or_none(&user.preferred_genres));
    println!("  Moods:      {}", list_or_none(&user.preferred_moods));
    println!("  Effective:  {}", list_or_none(&user.effective_genres));
    println!("  All genres: {}", list_or_none(&user.all_preferred_genres()));

    let indirect = &user.indirect_preferences;
    if !indirect.is_empty() {
        let source = indirect.source.as_ref().map_or("unknown", PreferenceSource::as_str);
        println!("\n  Detected via {source} ({}% confidence)", indirect.confidence);
        println!("    Genres:  {}", list_or_none(&indirect.detected_genres));
        println!("    Artists: {}", list_or_none(&indirect.detected_artists));
    }

    Ok(())
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}

pub fn set_preferences(
    db: &Database,
    user_id: &UserId,
    genres: Option<Vec<String>>,
    moods: Option<Vec<String>>,
    complete: bool,
) -> Result<()> {
    let user = if complete {
        db.complete_onboarding(
            user_id,
            genres.unwrap_or_default(),
            moods.unwrap_or_default(),
        )?
    } else {
        db.update_preferences(user_id, genres, moods)?
    };

    println!("✓ Preferences updated");
    println!("  Genres: {}", list_or_none(&user.preferred_genres));
    println!("  Moods:  {}", list_or_none(&user.preferred_moods));
    Ok(())
}

pub fn set_indirect(
    db: &Database,
    user_id: &UserId,
    genres: Vec<String>,
    artists: Vec<String>,
    source: Option<PreferenceSource>,
    confidence: u8,
) -> Result<()> {
    let indirect = IndirectPreferences {
        detected_genres: genres,
        detected_artists: artists,
        source,
        detected_at: Some(Utc::now()),
        confidence,
    };
    let user = db.set_indirect_preferences(user_id, indirect)?;

    println!("✓ Indirect preferences recorded");
    println!("  Effective genres: {}", list_or_none(&user.effective_genres));
    Ok(())
}

pub fn show_status(db: &Database, user_id: &UserId) -> Result<()> {
    let status = db.require_user(user_id)?.onboarding_status();
    println!("Onboarding completed: {}", status.onboarding_completed);
    println!("Has preferences:      {}", status.has_preferences);
    Ok(())
}
