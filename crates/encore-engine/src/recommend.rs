//! Personalised recommendation blending.
//!
//! Three candidate buckets feed the blend:
//!
//! - **Explicit**: songs matching the user's chosen genres.
//! - **Indirect**: songs by detected artists, then songs matching detected
//!   genres.
//! - **Similar to saved**: local songs the similarity provider relates to
//!   the user's earliest favorites.
//!
//! Each bucket gets an equal quota of the blend. Quotas a bucket cannot
//! fill are backfilled from the other buckets' unconsumed candidates.
//! Favorited songs never appear.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use encore_core::model::{Song, SongId, User, UserId};
use encore_core::schema::Database;

use crate::error::EngineResult;
use crate::provider::SimilarityProvider;

/// Number of candidate buckets sharing the blend.
pub const BUCKET_COUNT: usize = 3;

/// Size limits for the blend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendConfig {
    /// Upper bound on returned recommendations.
    pub total_limit: usize,
    /// Candidates fetched per store query.
    pub candidate_limit: usize,
    /// Overall deadline for one recommendation request, in seconds.
    pub timeout_secs: u64,
}

impl Default for BlendConfig {
    fn default() -> Self {
        Self {
            total_limit: 30,
            candidate_limit: 80,
            timeout_secs: 60,
        }
    }
}

impl BlendConfig {
    /// Quota for each bucket.
    pub fn per_bucket(&self) -> usize {
        self.total_limit / BUCKET_COUNT
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Controls the similar-to-saved bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    /// Earliest favorites used as seeds.
    pub favorites_sampled: usize,
    /// Similar tracks requested per seed.
    pub tracks_per_favorite: usize,
    /// Pause between seeds, in milliseconds.
    pub request_delay_ms: u64,
    /// Provider-side request rate limit.
    pub requests_per_second: u32,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            favorites_sampled: 5,
            tracks_per_favorite: 6,
            request_delay_ms: 250,
            requests_per_second: 5,
        }
    }
}

impl SimilarityConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

// ---------------------------------------------------------------------------
// Genre matching
// ---------------------------------------------------------------------------

/// One way of matching songs to genre names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenreStrategy {
    /// Substring match on the structured genre field.
    GenreField,
    /// Substring match on any Last.fm tag.
    TagList,
}

/// Strategies tried in order; the first with any result wins.
pub const GENRE_STRATEGIES: [GenreStrategy; 2] = [GenreStrategy::GenreField, GenreStrategy::TagList];

impl GenreStrategy {
    pub fn find<S: AsRef<str>>(
        self,
        db: &Database,
        genres: &[S],
        limit: usize,
    ) -> encore_core::Result<Vec<Song>> {
        match self {
            Self::GenreField => db.find_songs_by_genre_field(genres, limit),
            Self::TagList => db.find_songs_by_tag(genres, limit),
        }
    }
}

/// Songs matching any of `genres`, using the first strategy that finds any.
pub fn match_genres<S: AsRef<str>>(
    db: &Database,
    genres: &[S],
    limit: usize,
) -> encore_core::Result<Vec<Song>> {
    if genres.is_empty() {
        return Ok(Vec::new());
    }
    for strategy in GENRE_STRATEGIES {
        let songs = strategy.find(db, genres, limit)?;
        if !songs.is_empty() {
            log::debug!("{strategy:?} matched {} songs", songs.len());
            return Ok(songs);
        }
    }
    Ok(Vec::new())
}

// ---------------------------------------------------------------------------
// Buckets and allocation
// ---------------------------------------------------------------------------

/// The bucket a recommendation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecommendationSource {
    Explicit,
    Indirect,
    SimilarSaved,
}

/// A song proposed by one bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub song: Song,
    pub match_score: Option<f64>,
    /// Title of the favorite this candidate is similar to.
    pub based_on: Option<String>,
}

impl From<Song> for Candidate {
    fn from(song: Song) -> Self {
        Self {
            song,
            match_score: None,
            based_on: None,
        }
    }
}

/// Ordered candidates from one source.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub source: RecommendationSource,
    pub candidates: Vec<Candidate>,
}

impl Bucket {
    pub fn new(source: RecommendationSource, candidates: Vec<Candidate>) -> Self {
        Self { source, candidates }
    }

    fn empty(source: RecommendationSource) -> Self {
        Self::new(source, Vec::new())
    }
}

/// A blended recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub song: Song,
    #[serde(rename = "recommendationType")]
    pub source: RecommendationSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub based_on: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationStats {
    pub total: usize,
    pub from_explicit: usize,
    pub from_indirect: usize,
    pub from_saved_similar: usize,
}

impl RecommendationStats {
    pub fn tally(recommendations: &[Recommendation]) -> Self {
        let count = |source| recommendations.iter().filter(|r| r.source == source).count();
        Self {
            total: recommendations.len(),
            from_explicit: count(RecommendationSource::Explicit),
            from_indirect: count(RecommendationSource::Indirect),
            from_saved_similar: count(RecommendationSource::SimilarSaved),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub onboarding_completed: bool,
    pub preferred_genres: Vec<String>,
    pub total_favorites: usize,
}

/// The full response for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    pub recommendations: Vec<Recommendation>,
    pub stats: RecommendationStats,
    pub user: UserSummary,
}

/// Blend buckets into the final list.
///
/// Buckets contribute in order up to the per-bucket quota, then unconsumed
/// candidates from every bucket (in bucket order) backfill up to the total
/// limit. Excluded and repeated songs are skipped throughout.
pub fn allocate(
    buckets: &[Bucket],
    excluded: &HashSet<SongId>,
    config: &BlendConfig,
) -> Vec<Recommendation> {
    let quota = config.per_bucket();
    let target = config.total_limit;

    let mut selected: Vec<Recommendation> = Vec::with_capacity(target);
    let mut seen: HashSet<SongId> = HashSet::new();
    let mut leftovers: Vec<(RecommendationSource, &Candidate)> = Vec::new();

    let mut take = |source, candidate: &Candidate, selected: &mut Vec<Recommendation>| {
        let id = candidate.song.id;
        if excluded.contains(&id) || !seen.insert(id) {
            return false;
        }
        selected.push(Recommendation {
            song: candidate.song.clone(),
            source,
            match_score: candidate.match_score,
            based_on: candidate.based_on.clone(),
        });
        true
    };

    for bucket in buckets {
        let mut taken = 0;
        let mut next = 0;
        while next < bucket.candidates.len() && taken < quota && selected.len() < target {
            if take(bucket.source, &bucket.candidates[next], &mut selected) {
                taken += 1;
            }
            next += 1;
        }
        leftovers.extend(bucket.candidates[next..].iter().map(|c| (bucket.source, c)));
    }

    for (source, candidate) in leftovers {
        if selected.len() >= target {
            break;
        }
        take(source, candidate, &mut selected);
    }

    selected.retain(|r| !excluded.contains(&r.song.id));
    selected
}

// ---------------------------------------------------------------------------
// Recommender
// ---------------------------------------------------------------------------

/// Builds recommendations for users from the store and an optional
/// similarity provider.
pub struct Recommender<'a> {
    db: &'a Database,
    similarity: Option<&'a dyn SimilarityProvider>,
    blend: BlendConfig,
    similarity_config: SimilarityConfig,
}

impl std::fmt::Debug for Recommender<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recommender")
            .field("similarity", &self.similarity.map(|p| p.name()))
            .field("blend", &self.blend)
            .field("similarity_config", &self.similarity_config)
            .finish_non_exhaustive()
    }
}

impl<'a> Recommender<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            similarity: None,
            blend: BlendConfig::default(),
            similarity_config: SimilarityConfig::default(),
        }
    }

    #[must_use]
    pub fn with_similarity_provider(mut self, provider: &'a dyn SimilarityProvider) -> Self {
        self.similarity = Some(provider);
        self
    }

    #[must_use]
    pub fn with_blend_config(mut self, blend: BlendConfig) -> Self {
        self.blend = blend;
        self
    }

    #[must_use]
    pub fn with_similarity_config(mut self, config: SimilarityConfig) -> Self {
        self.similarity_config = config;
        self
    }

    /// Recommendations for one user.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown user, or a database error.
    /// Provider failures only shrink the similar-to-saved bucket.
    pub async fn recommend(&self, user_id: &UserId) -> EngineResult<Recommendations> {
        let user = self.db.require_user(user_id)?;
        let excluded = self.db.favorite_song_ids(user_id)?;
        log::info!(
            "Building recommendations for user {user_id} ({} favorites excluded)",
            excluded.len()
        );

        let explicit = self.explicit_bucket(&user, &excluded)?;
        let indirect = self.indirect_bucket(&user, &excluded)?;
        let similar = self.similar_bucket(user_id, &excluded).await?;
        log::debug!(
            "Candidates: {} explicit, {} indirect, {} similar",
            explicit.candidates.len(),
            indirect.candidates.len(),
            similar.candidates.len()
        );

        let recommendations = allocate(&[explicit, indirect, similar], &excluded, &self.blend);
        let stats = RecommendationStats::tally(&recommendations);
        log::info!(
            "Recommended {} songs ({} explicit, {} indirect, {} similar)",
            stats.total,
            stats.from_explicit,
            stats.from_indirect,
            stats.from_saved_similar
        );

        Ok(Recommendations {
            recommendations,
            stats,
            user: UserSummary {
                onboarding_completed: user.onboarding_completed,
                preferred_genres: user.preferred_genres,
                total_favorites: excluded.len(),
            },
        })
    }

    fn explicit_bucket(&self, user: &User, excluded: &HashSet<SongId>) -> EngineResult<Bucket> {
        let genres = &user.preferred_genres;
        let songs = match_genres(self.db, genres, self.blend.candidate_limit)?;
        Ok(Bucket::new(
            RecommendationSource::Explicit,
            collect_candidates(songs.into_iter().map(Candidate::from), excluded),
        ))
    }

    fn indirect_bucket(&self, user: &User, excluded: &HashSet<SongId>) -> EngineResult<Bucket> {
        let indirect = &user.indirect_preferences;
        if indirect.is_empty() {
            return Ok(Bucket::empty(RecommendationSource::Indirect));
        }

        let limit = self.blend.candidate_limit;
        let mut songs = if indirect.detected_artists.is_empty() {
            Vec::new()
        } else {
            self.db.find_songs_by_artists(&indirect.detected_artists, limit)?
        };
        songs.extend(match_genres(self.db, &indirect.detected_genres, limit)?);

        Ok(Bucket::new(
            RecommendationSource::Indirect,
            collect_candidates(songs.into_iter().map(Candidate::from), excluded),
        ))
    }

    async fn similar_bucket(
        &self,
        user_id: &UserId,
        excluded: &HashSet<SongId>,
    ) -> EngineResult<Bucket> {
        let favorites = self.db.list_favorites(user_id)?;
        let Some(provider) = self.similarity.filter(|_| !favorites.is_empty()) else {
            return Ok(Bucket::empty(RecommendationSource::SimilarSaved));
        };

        let config = &self.similarity_config;
        let mut candidates = Vec::new();
        for (i, favorite) in favorites.iter().take(config.favorites_sampled).enumerate() {
            if i > 0 && config.request_delay_ms > 0 {
                tokio::time::sleep(config.request_delay()).await;
            }
            let Some(seed) = self.db.get_song(&favorite.song_id)? else {
                continue;
            };

            let tracks = match provider
                .similar_tracks(&seed.title, &seed.artist, config.tracks_per_favorite)
                .await
            {
                Ok(tracks) => tracks,
                Err(e) => {
                    log::warn!(
                        "{} lookup failed for {} by {}: {e}",
                        provider.name(),
                        seed.title,
                        seed.artist
                    );
                    continue;
                }
            };

            for track in tracks {
                if let Some(song) = self.db.find_song_by_title_and_artist(&track.name, &track.artist)? {
                    candidates.push(Candidate {
                        song,
                        match_score: Some(track.match_score),
                        based_on: Some(seed.title.clone()),
                    });
                }
            }
        }

        Ok(Bucket::new(
            RecommendationSource::SimilarSaved,
            collect_candidates(candidates, excluded),
        ))
    }
}

/// Drop excluded and repeated songs, keeping first occurrences.
fn collect_candidates(
    candidates: impl IntoIterator<Item = Candidate>,
    excluded: &HashSet<SongId>,
) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| !excluded.contains(&c.song.id) && seen.insert(c.song.id))
        .collect()
}
