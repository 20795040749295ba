use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::model::ids::UserId;

/// How many detected genres may join the explicit ones in
/// [`User::effective_genres`].
pub const INDIRECT_GENRE_LIMIT: usize = 3;

/// Where an indirect preference signal was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferenceSource {
    Facebook,
    Google,
    ListeningHistory,
    Collaborative,
}

impl PreferenceSource {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Facebook => "facebook",
            Self::Google => "google",
            Self::ListeningHistory => "listening_history",
            Self::Collaborative => "collaborative",
        }
    }
}

impl fmt::Display for PreferenceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PreferenceSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "facebook" => Ok(Self::Facebook),
            "google" => Ok(Self::Google),
            "listening_history" => Ok(Self::ListeningHistory),
            "collaborative" => Ok(Self::Collaborative),
            other => Err(format!("unknown preference source: {other}")),
        }
    }
}

/// Genre and artist signals inferred from a connected profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndirectPreferences {
    pub detected_genres: Vec<String>,
    pub detected_artists: Vec<String>,
    pub source: Option<PreferenceSource>,
    pub detected_at: Option<DateTime<Utc>>,

    /// Detection confidence, 0--100.
    pub confidence: u8,
}

impl IndirectPreferences {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.detected_genres.is_empty() && self.detected_artists.is_empty()
    }
}

/// Onboarding progress as shown to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingStatus {
    pub onboarding_completed: bool,
    pub has_preferences: bool,
}

/// A user and their explicit and inferred music preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub display_name: Option<String>,
    pub email: Option<String>,

    /// Genres the user picked during onboarding. Order is irrelevant.
    pub preferred_genres: Vec<String>,
    pub preferred_moods: Vec<String>,
    pub onboarding_completed: bool,
    pub indirect_preferences: IndirectPreferences,

    /// Explicit genres plus the first few detected ones.
    ///
    /// Derived: the store recomputes it on every save.
    pub effective_genres: Vec<String>,

    pub created_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub fn new(display_name: Option<String>, email: Option<String>) -> Self {
        Self {
            id: UserId::new(),
            display_name,
            email,
            preferred_genres: Vec::new(),
            preferred_moods: Vec::new(),
            onboarding_completed: false,
            indirect_preferences: IndirectPreferences::default(),
            effective_genres: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_preferred_genres<I, S>(mut self, genres: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preferred_genres = genres.into_iter().map(Into::into).collect();
        self.refresh_effective_genres();
        self
    }

    #[must_use]
    pub fn with_indirect_preferences(mut self, indirect: IndirectPreferences) -> Self {
        self.indirect_preferences = indirect;
        self.refresh_effective_genres();
        self
    }

    /// Recompute [`Self::effective_genres`] from the current preferences.
    pub fn refresh_effective_genres(&mut self) {
        self.effective_genres = union_preserving_order(
            &self.preferred_genres,
            self.indirect_preferences
                .detected_genres
                .iter()
                .take(INDIRECT_GENRE_LIMIT),
        );
    }

    /// Every explicit and detected genre, without the detected-genre cap.
    #[must_use]
    pub fn all_preferred_genres(&self) -> Vec<String> {
        union_preserving_order(
            &self.preferred_genres,
            self.indirect_preferences.detected_genres.iter(),
        )
    }

    #[must_use]
    pub fn onboarding_status(&self) -> OnboardingStatus {
        OnboardingStatus {
            onboarding_completed: self.onboarding_completed,
            has_preferences: !self.preferred_genres.is_empty(),
        }
    }
}

fn union_preserving_order<'a>(
    first: &'a [String],
    rest: impl Iterator<Item = &'a String>,
) -> Vec<String> {
    let mut seen = HashSet::new();
    first
        .iter()
        .chain(rest)
        .filter(|g| seen.insert(g.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detected(genres: &[&str]) -> IndirectPreferences {
        IndirectPreferences {
            detected_genres: genres.iter().map(|g| (*g).to_string()).collect(),
            ..IndirectPreferences::default()
        }
    }

    #[test]
    fn test_effective_genres_caps_indirect_at_three() {
        let user = User::new(None, None)
            .with_preferred_genres(["Rock"])
            .with_indirect_preferences(detected(&["Jazz", "Pop", "Metal", "Folk"]));

        assert_eq!(user.effective_genres, ["Rock", "Jazz", "Pop", "Metal"]);
    }

    #[test]
    fn test_effective_genres_dedups() {
        let user = User::new(None, None)
            .with_preferred_genres(["Rock", "Pop"])
            .with_indirect_preferences(detected(&["Pop", "Jazz"]));

        assert_eq!(user.effective_genres, ["Rock", "Pop", "Jazz"]);
    }

    #[test]
    fn test_all_preferred_genres_is_uncapped() {
        let user = User::new(None, None)
            .with_indirect_preferences(detected(&["A", "B", "C", "D", "E"]));
        assert_eq!(user.all_preferred_genres().len(), 5);
        assert_eq!(user.effective_genres.len(), 3);
    }

    #[test]
    fn test_onboarding_status() {
        let mut user = User::new(Some("Ana".to_string()), None);
        assert_eq!(
            user.onboarding_status(),
            OnboardingStatus {
                onboarding_completed: false,
                has_preferences: false
            }
        );

        user = user.with_preferred_genres(["Rock"]);
        user.onboarding_completed = true;
        assert!(user.onboarding_status().has_preferences);
        assert!(user.onboarding_status().onboarding_completed);
    }

    #[test]
    fn test_preference_source_parse() {
        assert_eq!(
            "listening_history".parse::<PreferenceSource>().unwrap(),
            PreferenceSource::ListeningHistory
        );
        assert_eq!(
            "Google".parse::<PreferenceSource>().unwrap(),
            PreferenceSource::Google
        );
        assert!("myspace".parse::<PreferenceSource>().is_err());
    }

    #[test]
    fn test_indirect_is_empty() {
        assert!(IndirectPreferences::default().is_empty());
        assert!(!detected(&["Jazz"]).is_empty());
    }
}
