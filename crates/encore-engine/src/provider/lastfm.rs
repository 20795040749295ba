//! Last.fm provider.
//!
//! Implements [`SimilarityProvider`] over `track.getSimilar` and
//! [`TrackInfoProvider`] over `track.getInfo`. Last.fm encodes counts as
//! strings, wraps single results without an array, and reports API errors
//! as a JSON body; the private response types below absorb all of that.

use std::time::Duration;

use async_trait::async_trait;
use backon::Retryable;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use encore_core::model::SimilarTrack;

use super::resilience::{retry_policy, RateLimiter};
use super::{SimilarityProvider, TrackInfo, TrackInfoProvider};
use crate::error::{ProviderError, ProviderResult};

const LASTFM_API_BASE: &str = "https://ws.audioscrobbler.com/2.0/";
const SOURCE_NAME: &str = "Last.fm";

/// Tags kept per track, most popular first.
pub const TOP_TAGS: usize = 5;

/// Requests per second allowed for non-commercial use.
pub const DEFAULT_REQUESTS_PER_SECOND: u32 = 5;

// Last.fm API error codes
const ERROR_INVALID_PARAMETERS: i64 = 6;
const ERROR_OPERATION_FAILED: i64 = 8;
const ERROR_SERVICE_OFFLINE: i64 = 11;
const ERROR_TEMPORARILY_UNAVAILABLE: i64 = 16;
const ERROR_RATE_LIMIT: i64 = 29;

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::Many(items) => items,
            Self::One(item) => vec![item],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Numeric {
    Float(f64),
    Text(String),
}

impl Numeric {
    fn as_f64(&self) -> f64 {
        match self {
            Self::Float(v) => *v,
            Self::Text(s) => s.trim().parse().unwrap_or(0.0),
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn as_u64(&self) -> u64 {
        match self {
            Self::Float(v) if *v > 0.0 => *v as u64,
            Self::Float(_) => 0,
            Self::Text(s) => s.trim().parse().unwrap_or(0),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ArtistRef {
    Object { name: String },
    Name(String),
}

impl ArtistRef {
    fn into_name(self) -> String {
        match self {
            Self::Object { name } | Self::Name(name) => name,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct SimilarResponse {
    similartracks: SimilarTracks,
}

#[derive(Debug, Deserialize)]
struct SimilarTracks {
    #[serde(default)]
    track: OneOrMany<SimilarEntry>,
}

#[derive(Debug, Deserialize)]
struct SimilarEntry {
    name: String,
    artist: ArtistRef,
    #[serde(rename = "match")]
    match_score: Option<Numeric>,
}

#[derive(Debug, Deserialize)]
struct InfoResponse {
    track: InfoTrack,
}

#[derive(Debug, Deserialize)]
struct InfoTrack {
    #[serde(default)]
    mbid: Option<String>,
    listeners: Option<Numeric>,
    playcount: Option<Numeric>,
    #[serde(default)]
    toptags: Option<TopTags>,
}

#[derive(Debug, Deserialize)]
struct TopTags {
    #[serde(default)]
    tag: OneOrMany<Tag>,
}

#[derive(Debug, Deserialize)]
struct Tag {
    name: String,
}

impl From<SimilarEntry> for SimilarTrack {
    fn from(entry: SimilarEntry) -> Self {
        Self {
            name: entry.name,
            artist: entry.artist.into_name(),
            match_score: entry.match_score.as_ref().map_or(0.0, Numeric::as_f64),
        }
    }
}

impl From<InfoTrack> for TrackInfo {
    fn from(track: InfoTrack) -> Self {
        let tags = track
            .toptags
            .map(|t| t.tag.into_vec())
            .unwrap_or_default()
            .into_iter()
            .map(|t| t.name)
            .take(TOP_TAGS)
            .collect();
        Self {
            playcount: track.playcount.as_ref().map_or(0, Numeric::as_u64),
            listeners: track.listeners.as_ref().map_or(0, Numeric::as_u64),
            tags,
            mbid: track.mbid.filter(|m| !m.is_empty()),
        }
    }
}

/// Decode a Last.fm response body.
///
/// `Ok(None)` means Last.fm answered that the track does not exist.
fn parse_body<T: DeserializeOwned>(body: &str) -> ProviderResult<Option<T>> {
    let value: serde_json::Value = serde_json::from_str(body).map_err(|e| ProviderError::Parse {
        source_name: SOURCE_NAME.to_string(),
        message: e.to_string(),
    })?;

    if value.get("error").is_some() {
        let err: ApiError = serde_json::from_value(value).map_err(|e| ProviderError::Parse {
            source_name: SOURCE_NAME.to_string(),
            message: e.to_string(),
        })?;
        return match err.error {
            ERROR_INVALID_PARAMETERS => Ok(None),
            ERROR_RATE_LIMIT => Err(ProviderError::RateLimited {
                source_name: SOURCE_NAME.to_string(),
            }),
            ERROR_OPERATION_FAILED | ERROR_SERVICE_OFFLINE | ERROR_TEMPORARILY_UNAVAILABLE => {
                Err(ProviderError::Http {
                    source_name: SOURCE_NAME.to_string(),
                    message: err.message,
                })
            }
            code => Err(ProviderError::Api {
                source_name: SOURCE_NAME.to_string(),
                code,
                message: err.message,
            }),
        };
    }

    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| ProviderError::Parse {
            source_name: SOURCE_NAME.to_string(),
            message: e.to_string(),
        })
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Last.fm API client.
///
/// Owns its HTTP client, API key, rate limiter and retry policy.
#[derive(Debug, Clone)]
pub struct LastFmClient {
    http: Client,
    api_key: String,
    base_url: String,
    rate_limiter: RateLimiter,
}

impl LastFmClient {
    /// Create a client for the given API key.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::NotConfigured`] for a blank key, or a
    /// request error if the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>) -> ProviderResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ProviderError::NotConfigured {
                source_name: SOURCE_NAME.to_string(),
                hint: "set lastfm_api_key or ENCORE_LASTFM_API_KEY".to_string(),
            });
        }

        let http = Client::builder()
            .user_agent(concat!("encore/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            api_key,
            base_url: LASTFM_API_BASE.to_string(),
            rate_limiter: RateLimiter::new(DEFAULT_REQUESTS_PER_SECOND),
        })
    }

    /// Build a client from an optional configured key.
    pub fn from_config(api_key: Option<&str>) -> ProviderResult<Self> {
        Self::new(api_key.unwrap_or_default())
    }

    /// Override the API endpoint.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_rate_limit(mut self, requests_per_second: u32) -> Self {
        self.rate_limiter = RateLimiter::new(requests_per_second);
        self
    }

    /// Call an API method, retrying transient failures with backoff.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, &str)],
    ) -> ProviderResult<Option<T>> {
        (|| async { self.call_once(method, params).await })
            .retry(retry_policy())
            .when(ProviderError::is_transient)
            .notify(|err, delay| {
                log::debug!("Retrying Last.fm {method} in {delay:?}: {err}");
            })
            .await
    }

    async fn call_once<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, &str)],
    ) -> ProviderResult<Option<T>> {
        self.rate_limiter.acquire().await;

        let mut query = vec![
            ("method", method),
            ("api_key", self.api_key.as_str()),
            ("format", "json"),
        ];
        query.extend_from_slice(params);

        let response = self.http.get(&self.base_url).query(&query).send().await?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited {
                source_name: SOURCE_NAME.to_string(),
            });
        }
        if status.is_server_error() {
            return Err(ProviderError::Http {
                source_name: SOURCE_NAME.to_string(),
                message: status.to_string(),
            });
        }

        // Client errors still carry a JSON error body worth decoding.
        let body = response.text().await?;
        parse_body(&body)
    }
}

#[async_trait]
impl SimilarityProvider for LastFmClient {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn similar_tracks(
        &self,
        title: &str,
        artist: &str,
        limit: usize,
    ) -> ProviderResult<Vec<SimilarTrack>> {
        let limit = limit.to_string();
        let response: Option<SimilarResponse> = self
            .call(
                "track.getSimilar",
                &[
                    ("artist", artist),
                    ("track", title),
                    ("limit", &limit),
                    ("autocorrect", "1"),
                ],
            )
            .await?;

        let tracks: Vec<SimilarTrack> = response
            .map(|r| r.similartracks.track.into_vec())
            .unwrap_or_default()
            .into_iter()
            .map(SimilarTrack::from)
            .collect();
        log::debug!(
            "Last.fm returned {} similar tracks for {title} by {artist}",
            tracks.len()
        );
        Ok(tracks)
    }
}

#[async_trait]
impl TrackInfoProvider for LastFmClient {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn track_info(&self, title: &str, artist: &str) -> ProviderResult<Option<TrackInfo>> {
        let response: Option<InfoResponse> = self
            .call(
                "track.getInfo",
                &[("artist", artist), ("track", title), ("autocorrect", "1")],
            )
            .await?;
        Ok(response.map(|r| TrackInfo::from(r.track)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = LastFmClient::new("test-key").unwrap();
        let debug = format!("{client:?}");
        assert!(debug.contains("LastFmClient"));
        assert!(debug.contains("RateLimiter"));
    }

    #[test]
    fn test_blank_key_is_not_configured() {
        let err = LastFmClient::from_config(None).unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured { .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_similar_response_deserialize() {
        let body = r#"{
            "similartracks": {
                "track": [
                    {"name": "Fix You", "match": 1.0, "artist": {"name": "Coldplay"}},
                    {"name": "Creep", "match": "0.42", "artist": {"name": "Radiohead"}}
                ],
                "@attr": {"artist": "Coldplay"}
            }
        }"#;
        let response: SimilarResponse = parse_body(body).unwrap().unwrap();
        let tracks: Vec<SimilarTrack> = response
            .similartracks
            .track
            .into_vec()
            .into_iter()
            .map(SimilarTrack::from)
            .collect();

        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].artist, "Coldplay");
        assert!((tracks[1].match_score - 0.42).abs() < 1e-9);
    }

    #[test]
    fn test_single_similar_track_not_wrapped() {
        let body = r#"{"similartracks": {"track":
            {"name": "Creep", "match": 0.5, "artist": "Radiohead"}}}"#;
        let response: SimilarResponse = parse_body(body).unwrap().unwrap();
        let tracks = response.similartracks.track.into_vec();
        assert_eq!(tracks.len(), 1);
        assert_eq!(SimilarTrack::from(tracks.into_iter().next().unwrap()).artist, "Radiohead");
    }

    #[test]
    fn test_info_response_string_counts_and_top_tags() {
        let body = r#"{"track": {
            "name": "Yellow",
            "mbid": "",
            "listeners": "1500",
            "playcount": "98000",
            "toptags": {"tag": [
                {"name": "rock"}, {"name": "alternative"}, {"name": "britpop"},
                {"name": "indie"}, {"name": "coldplay"}, {"name": "00s"}
            ]}
        }}"#;
        let response: InfoResponse = parse_body(body).unwrap().unwrap();
        let info = TrackInfo::from(response.track);

        assert_eq!(info.playcount, 98_000);
        assert_eq!(info.listeners, 1500);
        assert_eq!(info.tags.len(), TOP_TAGS);
        assert_eq!(info.tags[0], "rock");
        assert!(info.mbid.is_none());
    }

    #[test]
    fn test_unknown_track_is_none() {
        let body = r#"{"error": 6, "message": "Track not found"}"#;
        let parsed: Option<InfoResponse> = parse_body(body).unwrap();
        assert!(parsed.is_none());
    }

    #[test]
    fn test_rate_limit_error_is_transient() {
        let body = r#"{"error": 29, "message": "Rate limit exceeded"}"#;
        let err = parse_body::<InfoResponse>(body).unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited { .. }));
        assert!(err.is_transient());
    }

    #[test]
    fn test_invalid_key_is_permanent() {
        let body = r#"{"error": 10, "message": "Invalid API key"}"#;
        let err = parse_body::<InfoResponse>(body).unwrap_err();
        assert!(matches!(err, ProviderError::Api { code: 10, .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_garbage_body_is_parse_error() {
        let err = parse_body::<InfoResponse>("<html>").unwrap_err();
        assert!(matches!(err, ProviderError::Parse { .. }));
    }
}
