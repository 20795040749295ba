use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::SongId;

/// A track suggested by a similarity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarTrack {
    pub name: String,
    pub artist: String,

    /// Provider-reported similarity in 0.0--1.0.
    #[serde(rename = "match", default)]
    pub match_score: f64,
}

/// Last.fm enrichment: listening statistics and folksonomy tags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LastFmData {
    pub playcount: u64,
    pub listeners: u64,
    pub tags: Vec<String>,
    pub mbid: Option<String>,
    pub similar_tracks: Vec<SimilarTrack>,
}

/// YouTube video engagement for the song's music video.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YoutubeData {
    pub video_id: Option<String>,
    pub views: u64,
    pub likes: u64,
    pub comment_count: u64,
    pub fetched_at: Option<DateTime<Utc>>,
}

/// Community rating on a 0--5 scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rating {
    pub value: f64,
    pub votes: u32,
}

/// MusicBrainz identifiers and community rating.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MusicBrainzData {
    pub mbid: Option<String>,
    pub rating: Option<Rating>,
    pub release_group_id: Option<String>,
}

/// A song in the catalog.
///
/// Core fields come from the primary catalog provider; the enrichment
/// sub-records are filled independently and any of them may be absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    #[serde(default = "SongId::new")]
    pub id: SongId,

    /// Identifier in the primary external catalog. Unique across songs.
    pub external_id: String,

    pub title: String,
    pub artist: String,

    #[serde(default)]
    pub album: Option<String>,

    /// URL of a short audio preview.
    #[serde(default)]
    pub preview_url: Option<String>,

    #[serde(default)]
    pub cover_url: Option<String>,

    #[serde(default)]
    pub duration_secs: Option<u32>,

    #[serde(default)]
    pub release_date: Option<String>,

    /// Structured genre label, when the provider supplies one.
    #[serde(default)]
    pub genre: Option<String>,

    /// Provider rank (higher is more popular).
    #[serde(default)]
    pub rank: Option<i64>,

    /// Provider popularity scalar (higher is more popular).
    #[serde(default)]
    pub popularity: Option<f64>,

    /// Interaction counter, incremented on every view.
    #[serde(default)]
    pub counter: u64,

    #[serde(default)]
    pub last_viewed_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub lastfm: Option<LastFmData>,

    #[serde(default)]
    pub youtube: Option<YoutubeData>,

    #[serde(default)]
    pub musicbrainz: Option<MusicBrainzData>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Song {
    #[must_use]
    pub fn new(
        external_id: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: SongId::new(),
            external_id: external_id.into(),
            title: title.into(),
            artist: artist.into(),
            album: None,
            preview_url: None,
            cover_url: None,
            duration_secs: None,
            release_date: None,
            genre: None,
            rank: None,
            popularity: None,
            counter: 0,
            last_viewed_at: None,
            lastfm: None,
            youtube: None,
            musicbrainz: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }

    #[must_use]
    pub fn with_rank(mut self, rank: i64) -> Self {
        self.rank = Some(rank);
        self
    }

    #[must_use]
    pub fn with_popularity(mut self, popularity: f64) -> Self {
        self.popularity = Some(popularity);
        self
    }

    #[must_use]
    pub fn with_counter(mut self, counter: u64) -> Self {
        self.counter = counter;
        self
    }

    #[must_use]
    pub fn with_lastfm(mut self, lastfm: LastFmData) -> Self {
        self.lastfm = Some(lastfm);
        self
    }

    #[must_use]
    pub fn with_youtube(mut self, youtube: YoutubeData) -> Self {
        self.youtube = Some(youtube);
        self
    }

    #[must_use]
    pub fn with_musicbrainz(mut self, musicbrainz: MusicBrainzData) -> Self {
        self.musicbrainz = Some(musicbrainz);
        self
    }

    /// Last.fm tags, or an empty slice when the song was never enriched.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        self.lastfm.as_ref().map_or(&[], |l| l.tags.as_slice())
    }

    #[must_use]
    pub fn play_count(&self) -> u64 {
        self.lastfm.as_ref().map_or(0, |l| l.playcount)
    }

    #[must_use]
    pub fn listeners(&self) -> u64 {
        self.lastfm.as_ref().map_or(0, |l| l.listeners)
    }

    #[must_use]
    pub fn rating_value(&self) -> f64 {
        self.musicbrainz
            .as_ref()
            .and_then(|m| m.rating)
            .map_or(0.0, |r| r.value)
    }

    #[must_use]
    pub fn youtube_views(&self) -> u64 {
        self.youtube.as_ref().map_or(0, |y| y.views)
    }

    #[must_use]
    pub fn youtube_likes(&self) -> u64 {
        self.youtube.as_ref().map_or(0, |y| y.likes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_song_new() {
        let song = Song::new("dz-1", "Yellow", "Coldplay");
        assert_eq!(song.external_id, "dz-1");
        assert_eq!(song.counter, 0);
        assert!(song.lastfm.is_none());
        assert!(song.tags().is_empty());
    }

    #[test]
    fn test_signal_accessors_default_to_zero() {
        let song = Song::new("dz-1", "Yellow", "Coldplay");
        assert_eq!(song.play_count(), 0);
        assert_eq!(song.listeners(), 0);
        assert!(song.rating_value().abs() < f64::EPSILON);
        assert_eq!(song.youtube_views(), 0);
        assert_eq!(song.youtube_likes(), 0);
    }

    #[test]
    fn test_signal_accessors_read_sub_records() {
        let song = Song::new("dz-1", "Yellow", "Coldplay")
            .with_lastfm(LastFmData {
                playcount: 1000,
                listeners: 200,
                tags: vec!["britpop".to_string()],
                ..LastFmData::default()
            })
            .with_youtube(YoutubeData {
                views: 50,
                likes: 5,
                ..YoutubeData::default()
            })
            .with_musicbrainz(MusicBrainzData {
                rating: Some(Rating {
                    value: 4.5,
                    votes: 10,
                }),
                ..MusicBrainzData::default()
            });

        assert_eq!(song.play_count(), 1000);
        assert_eq!(song.listeners(), 200);
        assert_eq!(song.tags(), ["britpop".to_string()]);
        assert!((song.rating_value() - 4.5).abs() < f64::EPSILON);
        assert_eq!(song.youtube_views(), 50);
        assert_eq!(song.youtube_likes(), 5);
    }

    #[test]
    fn test_deserialize_minimal_record() {
        let json = r#"{"external_id": "dz-9", "title": "Creep", "artist": "Radiohead"}"#;
        let song: Song = serde_json::from_str(json).unwrap();
        assert_eq!(song.title, "Creep");
        assert_eq!(song.counter, 0);
        assert!(song.genre.is_none());
    }

    #[test]
    fn test_similar_track_uses_match_key() {
        let json = r#"{"name": "Fix You", "artist": "Coldplay", "match": 0.8}"#;
        let track: SimilarTrack = serde_json::from_str(json).unwrap();
        assert!((track.match_score - 0.8).abs() < f64::EPSILON);
    }
}
