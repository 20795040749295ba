use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use encore_core::model::{FavoriteId, SongId, UserId};
use encore_core::schema::Database;
use encore_engine::{Config, TrendWindow};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "encore", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the database (default: ~/.local/share/encore/encore.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Capture a popularity snapshot of every song
    ///
    /// Scores each song against the catalog-wide maxima of seven signals
    /// (views, provider popularity, Last.fm play count and listeners,
    /// MusicBrainz rating, YouTube views and likes) and stores one
    /// snapshot row per song under a shared pass id.
    ///
    /// Intended to run from a scheduler such as cron. Passes are
    /// serialised: a second run waits for the first to finish.
    Snapshot,
    /// Show trending songs
    ///
    /// Compares the latest snapshot pass against an earlier one and ranks
    /// the biggest movers, then the highest scorers. When nothing moved,
    /// shows the top songs by score instead.
    Trending {
        /// Comparison window: 24h (last two passes) or lastweek (last seven)
        #[arg(long, default_value = "24h")]
        window: TrendWindow,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Personalised recommendations for a user
    Recommend {
        user_id: UserId,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Import songs from a JSON file (upserted by external id)
    Import {
        /// Path to a JSON array of songs, or an object with a "songs" array
        file: PathBuf,
    },
    /// Inspect songs
    Song {
        #[command(subcommand)]
        action: SongCommand,
    },
    /// Manage a user's favorites
    Favorite {
        #[command(subcommand)]
        action: FavoriteCommand,
    },
    /// Manage users and their preferences
    User {
        #[command(subcommand)]
        action: UserCommand,
    },
    /// Fetch Last.fm data for songs that have none
    Enrich {
        /// Maximum songs to enrich
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Show catalog statistics
    Stats,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Debug, clap::Subcommand)]
enum SongCommand {
    /// List songs, most popular first
    List {
        #[arg(long, default_value_t = 1)]
        page: usize,

        #[arg(long, default_value_t = 50)]
        limit: usize,

        #[arg(long)]
        json: bool,
    },
    /// Show a song and its enrichment data
    Show { song_id: SongId },
    /// Record a view (increments the interaction counter)
    View { song_id: SongId },
    /// Tracks similar to a song, via Last.fm
    Similar {
        song_id: SongId,

        #[arg(long, default_value_t = encore_engine::similar::SIMILAR_LIMIT)]
        limit: usize,

        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, clap::Subcommand)]
enum FavoriteCommand {
    /// Save a song for a user
    Add { user_id: UserId, song_id: SongId },
    /// List a user's favorites, newest first
    List {
        user_id: UserId,

        #[arg(long)]
        json: bool,
    },
    /// Remove a favorite by id
    Remove { favorite_id: FavoriteId },
}

#[derive(Debug, clap::Subcommand)]
enum UserCommand {
    /// Create a user
    Add {
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        email: Option<String>,
    },
    /// Show a user
    Show {
        user_id: UserId,

        #[arg(long)]
        json: bool,
    },
    /// Set preferred genres and moods
    ///
    /// With --complete the lists replace the current ones and onboarding is
    /// marked complete. Otherwise only the lists given are replaced.
    Prefs {
        user_id: UserId,

        /// Comma-separated genres
        #[arg(long, value_delimiter = ',')]
        genres: Option<Vec<String>>,

        /// Comma-separated moods
        #[arg(long, value_delimiter = ',')]
        moods: Option<Vec<String>>,

        /// Mark onboarding as complete
        #[arg(long)]
        complete: bool,
    },
    /// Record genres and artists detected from a connected profile
    Indirect {
        user_id: UserId,

        /// Comma-separated genres
        #[arg(long, value_delimiter = ',')]
        genres: Vec<String>,

        /// Comma-separated artists
        #[arg(long, value_delimiter = ',')]
        artists: Vec<String>,

        /// facebook, google, listening_history or collaborative
        #[arg(long)]
        source: Option<encore_core::model::PreferenceSource>,

        /// Detection confidence, 0-100
        #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=100))]
        confidence: u8,
    },
    /// Show onboarding status
    Status { user_id: UserId },
}

#[derive(Debug, clap::Subcommand)]
enum ConfigCommand {
    /// Show the effective configuration
    Show,
    /// Print one value, or the whole config file
    Get { key: Option<String> },
    /// Set a value in the config file (e.g. recommend.timeout_secs 30)
    Set { key: String, value: String },
    /// Print the config file path
    Path,
    /// Print an example config file
    Example,
    /// Create the config file with defaults
    Init,
}

fn open_database(config: &Config) -> Result<Database> {
    let db_path = &config.database_path;

    // Ensure database directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    Database::open(db_path).with_context(|| format!("Failed to open {}", db_path.display()))
}

fn run_config(action: ConfigCommand) -> Result<()> {
    match action {
        ConfigCommand::Show => commands::config::show_config(),
        ConfigCommand::Get { key } => commands::config::get_config(key.as_deref()),
        ConfigCommand::Set { key, value } => commands::config::set_config(&key, &value),
        ConfigCommand::Path => commands::config::show_path(),
        ConfigCommand::Example => commands::config::show_example(),
        ConfigCommand::Init => commands::config::init_config(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // Config commands work without a loadable config or database.
    if let Commands::Config { action } = cli.command {
        return run_config(action);
    }

    let config = match cli.db {
        Some(path) => Config::load_with_db_path(path)?,
        None => Config::load()?,
    };
    let mut db = open_database(&config)?;

    match cli.command {
        Commands::Snapshot => commands::run_snapshot(&mut db, &config)?,
        Commands::Trending { window, json } => commands::show_trending(&db, window, json)?,
        Commands::Recommend { user_id, json } => {
            commands::run_recommend(&db, &config, &user_id, json).await?;
        }
        Commands::Import { file } => commands::run_import(&db, &file)?,
        Commands::Song { action } => match action {
            SongCommand::List { page, limit, json } => {
                commands::song::list_songs(&db, page, limit, json)?;
            }
            SongCommand::Show { song_id } => commands::song::show_song(&db, &song_id)?,
            SongCommand::View { song_id } => commands::song::record_view(&db, &song_id)?,
            SongCommand::Similar {
                song_id,
                limit,
                json,
            } => commands::song::show_similar(&db, &config, &song_id, limit, json).await?,
        },
        Commands::Favorite { action } => match action {
            FavoriteCommand::Add { user_id, song_id } => {
                commands::favorite::add_favorite(&db, &user_id, &song_id)?;
            }
            FavoriteCommand::List { user_id, json } => {
                commands::favorite::list_favorites(&db, &user_id, json)?;
            }
            FavoriteCommand::Remove { favorite_id } => {
                commands::favorite::remove_favorite(&db, &favorite_id)?;
            }
        },
        Commands::User { action } => match action {
            UserCommand::Add { name, email } => commands::user::add_user(&db, name, email)?,
            UserCommand::Show { user_id, json } => commands::user::show_user(&db, &user_id, json)?,
            UserCommand::Prefs {
                user_id,
                genres,
                moods,
                complete,
            } => commands::user::set_preferences(&db, &user_id, genres, moods, complete)?,
            UserCommand::Indirect {
                user_id,
                genres,
                artists,
                source,
                confidence,
            } => commands::user::set_indirect(&db, &user_id, genres, artists, source, confidence)?,
            UserCommand::Status { user_id } => commands::user::show_status(&db, &user_id)?,
        },
        Commands::Enrich { limit } => commands::run_enrich(&db, &config, limit).await?,
        Commands::Stats => commands::show_stats(&db, &config)?,
        Commands::Config { action } => run_config(action)?,
    }

    Ok(())
}
