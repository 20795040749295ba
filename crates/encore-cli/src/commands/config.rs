use anyhow::{Context, Result};
use encore_engine::{config, Config};
use toml_edit::{DocumentMut, Item};

#[derive(Debug, Clone, Copy)]
enum Kind {
    Text,
    Float,
    Integer,
}

/// Keys accepted by `config get` and `config set`.
const KEYS: &[(&str, Kind)] = &[
    ("database_path", Kind::Text),
    ("lastfm_api_key", Kind::Text),
    ("scoring.counter", Kind::Float),
    ("scoring.popularity", Kind::Float),
    ("scoring.playcount", Kind::Float),
    ("scoring.listeners", Kind::Float),
    ("scoring.rating", Kind::Float),
    ("scoring.youtube_views", Kind::Float),
    ("scoring.youtube_likes", Kind::Float),
    ("recommend.total_limit", Kind::Integer),
    ("recommend.candidate_limit", Kind::Integer),
    ("recommend.timeout_secs", Kind::Integer),
    ("similarity.favorites_sampled", Kind::Integer),
    ("similarity.tracks_per_favorite", Kind::Integer),
    ("similarity.request_delay_ms", Kind::Integer),
    ("similarity.requests_per_second", Kind::Integer),
];

fn key_kind(key: &str) -> Result<Kind> {
    KEYS.iter()
        .find(|(k, _)| *k == key)
        .map(|(_, kind)| *kind)
        .ok_or_else(|| {
            let valid: Vec<&str> = KEYS.iter().map(|(k, _)| *k).collect();
            anyhow::anyhow!("Unknown config key: {key}\n\nValid keys: {}", valid.join(", "))
        })
}

fn parse_item(key: &str, kind: Kind, raw: &str) -> Result<Item> {
    Ok(match kind {
        Kind::Text => toml_edit::value(raw),
        Kind::Float => toml_edit::value(
            raw.parse::<f64>()
                .with_context(|| format!("{key} expects a number"))?,
        ),
        Kind::Integer => toml_edit::value(
            raw.parse::<i64>()
                .with_context(|| format!("{key} expects an integer"))?,
        ),
    })
}

/// Write `item` at a possibly dotted `key`, creating the section if needed.
fn set_item(doc: &mut DocumentMut, key: &str, item: Item) -> Result<()> {
    match key.split_once('.') {
        Some((section, field)) => {
            if !doc.contains_key(section) {
                doc[section] = toml_edit::table();
            }
            let table = doc[section]
                .as_table_mut()
                .ok_or_else(|| anyhow::anyhow!("[{section}] in the config file is not a table"))?;
            table[field] = item;
        }
        None => doc[key] = item,
    }
    Ok(())
}

/// Show the current effective configuration.
pub fn show_config() -> Result<()> {
    let config = Config::load()?;

    println!("Current Configuration");
    println!("=====================\n");

    println!("Config file: {}", config::config_file_path().display());

    let exists = config::config_file_path().exists();
    println!("File exists: {}\n", if exists { "yes" } else { "no (using defaults)" });

    println!("Settings:");
    println!("  database_path: {}", config.database_path.display());
    println!("  lastfm_api_key: {}", config.lastfm_key().unwrap_or("<not set>"));

    let w = &config.scoring;
    println!(
        "  scoring: counter {} popularity {} playcount {} listeners {} rating {} youtube_views {} youtube_likes {}",
        w.counter, w.popularity, w.playcount, w.listeners, w.rating, w.youtube_views, w.youtube_likes
    );
    let r = &config.recommend;
    println!(
        "  recommend: total_limit {} candidate_limit {} timeout_secs {}",
        r.total_limit, r.candidate_limit, r.timeout_secs
    );
    let s = &config.similarity;
    println!(
        "  similarity: favorites_sampled {} tracks_per_favorite {} request_delay_ms {} requests_per_second {}",
        s.favorites_sampled, s.tracks_per_favorite, s.request_delay_ms, s.requests_per_second
    );

    println!("\nPriority: CLI args > ENV vars (ENCORE_*) > Config file > Defaults");

    Ok(())
}

/// Get a specific config value.
pub fn get_config(key: Option<&str>) -> Result<()> {
    let Some(key) = key else {
        // No key provided, show entire config file contents
        let config_path = config::config_file_path();

        if config_path.exists() {
            let contents =
                std::fs::read_to_string(&config_path).context("Failed to read config file")?;
            print!("{contents}");
        } else {
            println!("Config file does not exist: {}", config_path.display());
            println!("\nRun 'encore config init' to create it.");
        }
        return Ok(());
    };

    key_kind(key)?;
    let config = serde_json::to_value(Config::load()?)?;
    let pointer = format!("/{}", key.replace('.', "/"));
    match config.pointer(&pointer) {
        Some(serde_json::Value::String(s)) => println!("{s}"),
        Some(serde_json::Value::Null) | None => println!("<not set>"),
        Some(other) => println!("{other}"),
    }

    Ok(())
}

/// Set a config value.
pub fn set_config(key: &str, value: &str) -> Result<()> {
    let item = parse_item(key, key_kind(key)?, value)?;
    let config_path = config::config_file_path();

    // Ensure config file exists
    config::ensure_config_file()?;

    let contents = std::fs::read_to_string(&config_path).context("Failed to read config file")?;
    let mut doc: DocumentMut = contents
        .parse()
        .context("Config file is not valid TOML")?;
    set_item(&mut doc, key, item)?;

    std::fs::write(&config_path, doc.to_string()).context("Failed to write config file")?;

    println!("✓ Updated {key} = {value}");
    println!("  in {}", config_path.display());

    if let Err(e) = Config::load() {
        println!("\n⚠ The configuration no longer loads: {e:#}");
    }

    Ok(())
}

/// Show the config file path.
pub fn show_path() -> Result<()> {
    let config_path = config::config_file_path();
    println!("{}", config_path.display());
    Ok(())
}

/// Show example configuration.
pub fn show_example() -> Result<()> {
    print!("{}", config::example_config());
    Ok(())
}

/// Initialize config file with defaults.
pub fn init_config() -> Result<()> {
    let created = config::ensure_config_file()?;
    let config_path = config::config_file_path();

    if created {
        println!("✓ Created config file: {}", config_path.display());
        println!("\nEdit this file to configure encore.");
    } else {
        println!("Config file already exists: {}", config_path.display());
    }

    Ok(())
}
