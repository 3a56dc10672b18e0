pub mod element;
pub mod jspf;
pub mod maker;

pub use element::*;
pub use maker::*;

use crate::models::EntityList;
use chrono::{DateTime, Utc};

/// A generated playlist. Recordings are fixed once the maker has run; only
/// presentation fields are changed afterwards.
#[derive(Debug, Clone, Default)]
pub struct Playlist {
    pub name: Option<String>,
    pub description: Option<String>,
    /// Patch that produced the playlist
    pub patch_slug: Option<String>,
    pub created_for: Option<String>,
    pub is_public: bool,
    pub expires_at: Option<DateTime<Utc>>,
    /// Server-side id, set once submitted
    pub mbid: Option<String>,
    pub recordings: EntityList,
}

impl Playlist {
    /// File-system friendly form of the name
    pub fn slug(&self) -> Option<String> {
        let name = self.name.as_deref().or(self.patch_slug.as_deref())?;
        let mut slug = String::with_capacity(name.len());
        for c in name.chars().flat_map(char::to_lowercase) {
            if c.is_alphanumeric() {
                slug.push(c);
            } else if !slug.ends_with('-') && !slug.is_empty() {
                slug.push('-');
            }
        }
        let slug = slug.trim_end_matches('-').to_string();
        (!slug.is_empty()).then_some(slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug() {
        let playlist = Playlist {
            name: Some("Daily Jams for rob, 2024-04-01 Mon".to_string()),
            ..Default::default()
        };
        assert_eq!(playlist.slug().as_deref(), Some("daily-jams-for-rob-2024-04-01-mon"));

        let unnamed = Playlist {
            patch_slug: Some("periodic-jams".to_string()),
            ..Default::default()
        };
        assert_eq!(unnamed.slug().as_deref(), Some("periodic-jams"));
        assert_eq!(Playlist::default().slug(), None);
    }
}
