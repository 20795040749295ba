//! Scoring, trending and recommendation engine for encore.
//!
//! Builds on the `encore-core` store: snapshot passes score the catalog,
//! trending compares passes, and the recommender blends explicit, inferred
//! and similarity-based candidates. External data comes in through the
//! provider traits in [`provider`].

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod config;
pub mod enrich;
pub mod error;
pub mod import;
pub mod provider;
pub mod recommend;
pub mod scoring;
pub mod similar;
pub mod trending;

pub use config::Config;
pub use enrich::{EnrichOptions, EnrichReport, Enricher};
pub use error::{EngineError, EngineResult, ProviderError, ProviderResult};
pub use import::{import_file, import_songs, ImportReport};
pub use provider::{LastFmClient, SimilarityProvider, TrackInfo, TrackInfoProvider};
pub use recommend::{
    BlendConfig, Recommendation, RecommendationSource, RecommendationStats, Recommendations,
    Recommender, SimilarityConfig,
};
pub use scoring::{take_snapshot, ScoreWeights, SnapshotReport};
pub use similar::{similar_to_song, SimilarMatch};
pub use trending::{trending, TrendEntry, TrendWindow};
