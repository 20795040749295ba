use anyhow::Result;
use encore_core::model::UserId;
use encore_core::schema::Database;
use encore_engine::{Config, EngineError, RecommendationSource, Recommender};

use super::{lastfm_client, print_json, song_line};

pub async fn run_recommend(db: &Database, config: &Config, user_id: &UserId, json: bool) -> Result<()> {
    let client = lastfm_client(config)?;
    if client.is_none() {
        log::info!("No Last.fm key configured; similar-to-saved recommendations disabled");
    }

    let mut recommender = Recommender::new(db)
        .with_blend_config(config.recommend)
        .with_similarity_config(config.similarity);
    if let Some(client) = &client {
        recommender = recommender.with_similarity_provider(client);
    }

    let deadline = config.recommend.timeout();
    let result = tokio::time::timeout(deadline, recommender.recommend(user_id))
        .await
        .map_err(|_| EngineError::Timeout {
            operation: "recommend",
            after: deadline,
        })??;

    if json {
        return print_json(&result);
    }

    println!("\n🎧 Recommendations for {user_id}\n");
    for (i, rec) in result.recommendations.iter().enumerate() {
        let tag = match rec.source {
            RecommendationSource::Explicit => "explicit",
            RecommendationSource::Indirect => "indirect",
            RecommendationSource::SimilarSaved => "similar",
        };
        match &rec.based_on {
            Some(seed) => println!(
                "  {:>2}. [{tag:<8}] {} (like {seed}, match {:.2})",
                i + 1,
                song_line(&rec.song),
                rec.match_score.unwrap_or_default()
            ),
            None => println!("  {:>2}. [{tag:<8}] {}", i + 1, song_line(&rec.song)),
        }
    }

    let stats = &result.stats;
    println!(
        "\n  Total: {} ({} explicit, {} indirect, {} similar to saved)",
        stats.total, stats.from_explicit, stats.from_indirect, stats.from_saved_similar
    );
    if !result.user.onboarding_completed {
        println!("  Onboarding not completed; set genres with `encore user prefs --complete`.");
    }

    Ok(())
}
