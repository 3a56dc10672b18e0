use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Version of the annotation key set written by lookup stages and read by filters.
/// Bump whenever a key is added, removed or changes meaning.
pub const ANNOTATION_KEYS_VERSION: u32 = 1;

/// Ordered sequence of entities flowing between stages; order encodes rank
pub type EntityList = Vec<Entity>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Recording,
    Artist,
    Release,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Recording => "recording",
            EntityKind::Artist => "artist",
            EntityKind::Release => "release",
        };
        f.write_str(name)
    }
}

/// The documented annotation keys. Each lookup stage writes some of these and
/// each filter declares which ones it reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnotationKey {
    /// When the user last listened to the recording
    LastListenedAt,
    /// The user's feedback: 1 loved, 0 neutral, -1 hated
    FeedbackScore,
    /// Score assigned by the recommendation engine
    RecommendationScore,
}

impl AnnotationKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnotationKey::LastListenedAt => "last-listened-at",
            AnnotationKey::FeedbackScore => "feedback-score",
            AnnotationKey::RecommendationScore => "recommendation-score",
        }
    }
}

impl fmt::Display for AnnotationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Side-channel data attached to an entity by lookup stages.
/// Not part of the entity's identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Annotations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_listened_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback_score: Option<i8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation_score: Option<f32>,
}

impl Annotations {
    pub fn has(&self, key: AnnotationKey) -> bool {
        match key {
            AnnotationKey::LastListenedAt => self.last_listened_at.is_some(),
            AnnotationKey::FeedbackScore => self.feedback_score.is_some(),
            AnnotationKey::RecommendationScore => self.recommendation_score.is_some(),
        }
    }
}

/// The artists credited on a recording, in credit order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistCredit {
    pub name: String,
    pub artist_mbids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRef {
    pub mbid: String,
    pub name: String,
    pub year: Option<u32>,
}

/// A recording, artist or release identified by its MusicBrainz id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub mbid: String,
    pub kind: EntityKind,
    pub name: Option<String>,
    pub artist_credit: Option<ArtistCredit>,
    pub release: Option<ReleaseRef>,
    pub duration_ms: Option<u32>,
    #[serde(default)]
    pub annotations: Annotations,
}

impl Entity {
    fn bare(mbid: impl Into<String>, kind: EntityKind) -> Self {
        Entity {
            mbid: mbid.into(),
            kind,
            name: None,
            artist_credit: None,
            release: None,
            duration_ms: None,
            annotations: Annotations::default(),
        }
    }

    pub fn recording(mbid: impl Into<String>) -> Self {
        Self::bare(mbid, EntityKind::Recording)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_artist_credit(mut self, name: impl Into<String>, artist_mbids: Vec<String>) -> Self {
        self.artist_credit = Some(ArtistCredit {
            name: name.into(),
            artist_mbids,
        });
        self
    }

    pub fn is_recording(&self) -> bool {
        self.kind == EntityKind::Recording
    }

    /// The first credited artist, used for per-artist limits
    pub fn primary_artist_mbid(&self) -> Option<&str> {
        self.artist_credit
            .as_ref()
            .and_then(|credit| credit.artist_mbids.first())
            .map(String::as_str)
    }

    pub fn artist_name(&self) -> &str {
        self.artist_credit
            .as_ref()
            .map(|credit| credit.name.as_str())
            .unwrap_or("[unknown]")
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("[unknown]")
    }
}

// Identity is the mbid alone; attributes and annotations may differ.
impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.mbid == other.mbid
    }
}

impl Eq for Entity {}

impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.mbid.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_identity_ignores_attributes_and_annotations() {
        let mut a = Entity::recording("r1").with_name("Song");
        a.annotations.feedback_score = Some(1);
        let b = Entity::recording("r1").with_name("Song (Remastered)");

        assert_eq!(a, b);
        let set: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_primary_artist_is_first_credit() {
        let rec = Entity::recording("r1")
            .with_artist_credit("A feat. B", vec!["a".to_string(), "b".to_string()]);
        assert_eq!(rec.primary_artist_mbid(), Some("a"));
        assert_eq!(Entity::recording("r2").primary_artist_mbid(), None);
    }

    #[test]
    fn test_annotation_wire_names() {
        let mut annotations = Annotations::default();
        annotations.last_listened_at = Some(Utc::now());
        annotations.feedback_score = Some(-1);
        assert!(annotations.has(AnnotationKey::LastListenedAt));
        assert!(!annotations.has(AnnotationKey::RecommendationScore));

        let json = serde_json::to_value(&annotations).unwrap();
        assert!(json.get(AnnotationKey::LastListenedAt.as_str()).is_some());
        assert_eq!(json[AnnotationKey::FeedbackScore.as_str()], -1);
        assert!(json.get(AnnotationKey::RecommendationScore.as_str()).is_none());
    }
}
