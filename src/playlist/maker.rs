use super::Playlist;
use crate::error::{PipelineError, Result};
use crate::models::EntityList;
use crate::pipeline::{BoxedElement, Element, PipelineContext, Sources};
use chrono::{DateTime, Utc};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{SeedableRng, thread_rng};
use std::collections::{HashMap, HashSet};

const APRIL_FIRST_DESCRIPTION: &str = "This playlist was hand-picked by a very opinionated \
     hamster. We regret nothing. Happy April Fools' Day!";

/// Title and description an upstream stage proposes for the playlist.
/// Read by [`PlaylistMakerElement`] when it has no name configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistTitle {
    pub name: String,
    pub description: String,
}

/// Settings for [`PlaylistMakerElement`]
#[derive(Debug, Clone, Default)]
pub struct PlaylistMakerConfig {
    pub name: Option<String>,
    pub description: Option<String>,
    pub patch_slug: Option<String>,
    /// Hard cap on the playlist length; `None` keeps everything
    pub max_num_recordings: Option<usize>,
    /// Cap per primary artist; `None` means unlimited
    pub max_artist_occurrence: Option<usize>,
    pub shuffle: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_public: bool,
    pub is_april_first: bool,
}

/// Terminal stage turning ranked recordings into a playlist
pub struct PlaylistMakerElement {
    config: PlaylistMakerConfig,
    seed: Option<u64>,
    sources: Sources,
}

impl PlaylistMakerElement {
    /// Rejects a zero recording or artist cap before anything runs
    pub fn new(config: PlaylistMakerConfig) -> Result<Self> {
        if config.max_artist_occurrence == Some(0) {
            return Err(PipelineError::in_stage(
                "playlist-maker",
                "max_artist_occurrence must be at least 1",
            ));
        }
        if config.max_num_recordings == Some(0) {
            return Err(PipelineError::in_stage(
                "playlist-maker",
                "max_num_recordings must be at least 1",
            ));
        }
        Ok(Self {
            config,
            seed: None,
            sources: Sources::single(),
        })
    }

    /// Use a fixed seed for the shuffle, making it reproducible
    #[cfg(test)]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn shuffle(&self, recordings: &mut EntityList) {
        match self.seed {
            Some(seed) => recordings.shuffle(&mut StdRng::seed_from_u64(seed)),
            None => recordings.shuffle(&mut thread_rng()),
        }
    }

    fn title(&self, ctx: &PipelineContext) -> Result<(String, Option<String>)> {
        let proposed = ctx.local.get::<PlaylistTitle>();
        let name = match (&self.config.name, proposed) {
            (Some(name), _) => name.clone(),
            (None, Some(title)) => title.name.clone(),
            (None, None) => {
                return Err(PipelineError::new(
                    "playlist name not configured and no upstream stage proposed one",
                ));
            }
        };
        let description = if self.config.is_april_first {
            Some(APRIL_FIRST_DESCRIPTION.to_string())
        } else {
            self.config
                .description
                .clone()
                .or_else(|| proposed.map(|title| title.description.clone()))
        };
        Ok((name, description))
    }
}

/// Select recordings in rank order: skip repeated mbids and recordings whose
/// primary artist already filled its slots, stop at `max_num_recordings`.
/// Recordings without an artist credit are not counted against any artist.
pub fn assemble(
    candidates: EntityList,
    max_num_recordings: Option<usize>,
    max_artist_occurrence: Option<usize>,
) -> EntityList {
    let limit = max_num_recordings.unwrap_or(usize::MAX);
    let mut selected = Vec::new();
    let mut seen = HashSet::new();
    let mut artist_counts: HashMap<String, usize> = HashMap::new();

    for recording in candidates {
        if selected.len() >= limit {
            break;
        }
        if seen.contains(&recording.mbid) {
            continue;
        }
        if let (Some(cap), Some(artist)) = (max_artist_occurrence, recording.primary_artist_mbid()) {
            let count = artist_counts.entry(artist.to_string()).or_insert(0);
            if *count >= cap {
                continue;
            }
            *count += 1;
        }
        seen.insert(recording.mbid.clone());
        selected.push(recording);
    }
    selected
}

impl Element for PlaylistMakerElement {
    type Output = Vec<Playlist>;

    fn name(&self) -> &'static str {
        "playlist-maker"
    }

    fn set_sources(&mut self, sources: Vec<BoxedElement>) -> Result<()> {
        self.sources.attach(self.name(), sources)
    }

    fn generate(&mut self, ctx: &mut PipelineContext) -> Result<Vec<Playlist>> {
        let candidates = self.sources.pull_one(self.name(), ctx)?;
        if let Some(other) = candidates.iter().find(|e| !e.is_recording()) {
            return Err(PipelineError::in_stage(
                self.name(),
                format!("expected recordings, received {} {}", other.kind, other.mbid),
            ));
        }
        let (name, description) = self.title(ctx).map_err(|e| e.at_stage(self.name()))?;

        let offered = candidates.len();
        let mut recordings = assemble(
            candidates,
            self.config.max_num_recordings,
            self.config.max_artist_occurrence,
        );
        debug!("selected {} of {offered} candidates", recordings.len());

        if self.config.shuffle {
            self.shuffle(&mut recordings);
        }

        info!("made playlist '{name}' with {} recordings", recordings.len());
        Ok(vec![Playlist {
            name: Some(name),
            description,
            patch_slug: self.config.patch_slug.clone(),
            created_for: None,
            is_public: self.config.is_public,
            expires_at: self.config.expires_at,
            mbid: None,
            recordings,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Entity, EntityKind};
    use crate::pipeline::lookups::RecordingListElement;

    fn by(mbid: &str, artist: &str) -> Entity {
        Entity::recording(mbid).with_artist_credit(artist.to_uppercase(), vec![artist.to_string()])
    }

    fn mbids(entities: &[Entity]) -> Vec<&str> {
        entities.iter().map(|e| e.mbid.as_str()).collect()
    }

    fn maker(config: PlaylistMakerConfig, input: EntityList) -> PlaylistMakerElement {
        let mut maker = PlaylistMakerElement::new(config).unwrap();
        maker
            .set_sources(vec![Box::new(RecordingListElement::new(input))])
            .unwrap();
        maker
    }

    fn named() -> PlaylistMakerConfig {
        PlaylistMakerConfig {
            name: Some("Test".to_string()),
            description: Some("Test playlist".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_rejects_zero_caps() {
        let config = PlaylistMakerConfig {
            max_artist_occurrence: Some(0),
            ..named()
        };
        assert!(PlaylistMakerElement::new(config).is_err());

        let config = PlaylistMakerConfig {
            max_num_recordings: Some(0),
            ..named()
        };
        assert!(PlaylistMakerElement::new(config).is_err());
    }

    #[test]
    fn test_dedup_keeps_first_ranked() {
        let input = vec![by("r1", "a"), by("r2", "b"), by("r1", "a"), by("r3", "c")];
        assert_eq!(mbids(&assemble(input, None, None)), vec!["r1", "r2", "r3"]);
    }

    #[test]
    fn test_duplicate_does_not_consume_artist_slot() {
        let input = vec![by("a1", "a"), by("a1", "a"), by("a2", "a"), by("a3", "a")];
        assert_eq!(mbids(&assemble(input, None, Some(2))), vec!["a1", "a2"]);
    }

    #[test]
    fn test_uncredited_recordings_are_not_capped() {
        let input = vec![
            Entity::recording("x1"),
            Entity::recording("x2"),
            Entity::recording("x3"),
        ];
        assert_eq!(assemble(input, None, Some(1)).len(), 3);
    }

    #[test]
    fn test_name_falls_back_to_local_storage() {
        let config = PlaylistMakerConfig::default();
        let mut maker = maker(config, vec![by("r1", "a")]);
        let mut ctx = PipelineContext::new();
        ctx.local.insert(PlaylistTitle {
            name: "Recommended recordings for rob".to_string(),
            description: "Your raw recommendations.".to_string(),
        });
        let playlists = maker.generate(&mut ctx).unwrap();
        assert_eq!(playlists[0].name.as_deref(), Some("Recommended recordings for rob"));
        assert_eq!(playlists[0].description.as_deref(), Some("Your raw recommendations."));
    }

    #[test]
    fn test_missing_name_is_an_error() {
        let mut maker = maker(PlaylistMakerConfig::default(), vec![]);
        let err = maker.generate(&mut PipelineContext::new()).unwrap_err();
        assert_eq!(err.stage.as_deref(), Some("playlist-maker"));
    }

    #[test]
    fn test_april_first_only_changes_description() {
        let input: EntityList = (0..5).map(|i| by(&format!("r{i}"), "a")).collect();
        let plain = maker(named(), input.clone())
            .generate(&mut PipelineContext::new())
            .unwrap();
        let config = PlaylistMakerConfig {
            is_april_first: true,
            ..named()
        };
        let joke = maker(config, input).generate(&mut PipelineContext::new()).unwrap();

        assert_eq!(joke[0].name, plain[0].name);
        assert_eq!(joke[0].description.as_deref(), Some(APRIL_FIRST_DESCRIPTION));
        assert_eq!(mbids(&joke[0].recordings), mbids(&plain[0].recordings));
    }

    #[test]
    fn test_rejects_non_recording_input() {
        let mut maker = maker(named(), vec![Entity {
            kind: EntityKind::Artist,
            ..Entity::recording("a")
        }]);
        let err = maker.generate(&mut PipelineContext::new()).unwrap_err();
        assert!(err.cause.contains("expected recordings"));
    }

    #[test]
    fn test_seeded_shuffle_is_reproducible() {
        let input: EntityList = (0..30).map(|i| by(&format!("r{i}"), &format!("a{i}"))).collect();
        let config = PlaylistMakerConfig {
            shuffle: true,
            ..named()
        };
        let first = maker(config.clone(), input.clone())
            .with_seed(7)
            .generate(&mut PipelineContext::new())
            .unwrap();
        let second = maker(config, input)
            .with_seed(7)
            .generate(&mut PipelineContext::new())
            .unwrap();
        assert_eq!(mbids(&first[0].recordings), mbids(&second[0].recordings));
    }
}
