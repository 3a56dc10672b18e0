use super::{InputKind, InputType, Patch, PatchArgs, PatchInput};
use crate::client::ListenBrainzApi;
use crate::error::{PipelineError, Result};
use crate::pipeline::filters::{ArtistCreditFilter, DuplicateRecordingFilter, HatedRecordingsFilter};
use crate::pipeline::lookups::{
    ConcatElement, ListensFeedbackLookup, MAX_RECS_LIMIT, RecordingLookupElement,
    UserRecordingRecommendationsElement,
};
use crate::pipeline::{BoxedElement, Element};
use crate::playlist::{Playlist, PlaylistMakerConfig, PlaylistMakerElement};
use std::rc::Rc;

pub const SLUG: &str = "recs-to-playlist";

const ARTIST_TYPES: [&str; 3] = ["top", "similar", "raw"];
const DEFAULT_COUNT: usize = 50;

const INPUTS: &[PatchInput] = &[
    PatchInput {
        name: "user_name",
        kind: InputKind::Argument,
        required: true,
        ty: InputType::Text,
        help: "MusicBrainz user name that has an account on ListenBrainz",
    },
    PatchInput {
        name: "artist_type",
        kind: InputKind::Argument,
        required: false,
        ty: InputType::Text,
        help: "which recommendations to use: top, similar or raw (default), or several joined by commas",
    },
    PatchInput {
        name: "count",
        kind: InputKind::Option,
        required: false,
        ty: InputType::Integer,
        help: "number of recordings in the playlist (default 50)",
    },
    PatchInput {
        name: "only_artists",
        kind: InputKind::Option,
        required: false,
        ty: InputType::Text,
        help: "comma separated artist MBIDs; keep only recordings credited to them",
    },
    PatchInput {
        name: "exclude_artists",
        kind: InputKind::Option,
        required: false,
        ty: InputType::Text,
        help: "comma separated artist MBIDs; drop recordings credited to them",
    },
];

/// Non-empty comma separated values, trimmed
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

/// A user's recommended recordings, best first, as a playlist.
/// Name and description come from the recommendations stage.
pub struct RecsToPlaylistPatch {
    api: Rc<dyn ListenBrainzApi>,
}

impl RecsToPlaylistPatch {
    pub fn new(api: Rc<dyn ListenBrainzApi>) -> Self {
        Self { api }
    }
}

impl Patch for RecsToPlaylistPatch {
    fn slug(&self) -> &'static str {
        SLUG
    }

    fn description(&self) -> &'static str {
        "Save the current recommended recordings for a given user and type (top, similar or raw)."
    }

    fn inputs(&self) -> &'static [PatchInput] {
        INPUTS
    }

    fn create(&self, args: &PatchArgs) -> Result<BoxedElement<Vec<Playlist>>> {
        let user_name = args.required_text("user_name")?;
        let artist_types = split_list(&args.text("artist_type").unwrap_or("raw").to_lowercase());
        if artist_types.is_empty()
            || artist_types
                .iter()
                .any(|artist_type| !ARTIST_TYPES.contains(&artist_type.as_str()))
        {
            return Err(PipelineError::new(format!(
                "artist type must be one of {}",
                ARTIST_TYPES.join(", ")
            )));
        }
        let count = match args.integer("count") {
            Some(count) if count < 1 => {
                return Err(PipelineError::new("count must be at least 1"));
            }
            Some(count) => (count as usize).min(MAX_RECS_LIMIT),
            None => DEFAULT_COUNT,
        };

        let mut recs: Vec<BoxedElement> = artist_types
            .iter()
            .map(|artist_type| -> BoxedElement {
                Box::new(UserRecordingRecommendationsElement::new(
                    self.api.clone(),
                    user_name,
                    artist_type.as_str(),
                    count,
                ))
            })
            .collect();
        // Several recommendation types overlap; keep each recording once
        let candidates: BoxedElement = if recs.len() == 1 {
            recs.remove(0)
        } else {
            let mut concat = ConcatElement::new();
            concat.set_sources(recs)?;
            let mut dedup = DuplicateRecordingFilter::first_occurrence();
            dedup.set_sources(vec![Box::new(concat)])?;
            Box::new(dedup)
        };

        let mut feedback = ListensFeedbackLookup::new(self.api.clone(), user_name);
        feedback.set_sources(vec![candidates])?;
        let mut lookup = RecordingLookupElement::new(self.api.clone());
        lookup.set_sources(vec![Box::new(feedback)])?;
        let mut stage: BoxedElement = Box::new(lookup);

        if let Some(only) = args.text("only_artists") {
            let mut filter = ArtistCreditFilter::include(split_list(only));
            filter.set_sources(vec![stage])?;
            stage = Box::new(filter);
        }
        if let Some(excluded) = args.text("exclude_artists") {
            let mut filter = ArtistCreditFilter::exclude(split_list(excluded));
            filter.set_sources(vec![stage])?;
            stage = Box::new(filter);
        }

        let mut hated = HatedRecordingsFilter::hated();
        hated.set_sources(vec![stage])?;

        let mut maker = PlaylistMakerElement::new(PlaylistMakerConfig {
            patch_slug: Some(SLUG.to_string()),
            max_num_recordings: Some(count),
            ..Default::default()
        })?;
        maker.set_sources(vec![Box::new(hated)])?;
        Ok(Box::new(maker))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{MockListenBrainzApi, Recommendation, RecommendationsPage, RecordingMetadata};
    use crate::pipeline::PipelineContext;

    fn args(raw: &[&str]) -> PatchArgs {
        let raw: Vec<String> = raw.iter().map(|w| w.to_string()).collect();
        PatchArgs::parse(INPUTS, &raw).unwrap()
    }

    #[test]
    fn test_rejects_unknown_artist_type() {
        let patch = RecsToPlaylistPatch::new(Rc::new(MockListenBrainzApi::new()));
        assert!(patch.create(&args(&["rob", "favourite"])).is_err());
        assert!(patch.create(&args(&["rob", "top,favourite"])).is_err());
        assert!(patch.create(&args(&["rob", "--count", "0"])).is_err());
    }

    fn metadata(mbids: &[String]) -> Result<Vec<RecordingMetadata>> {
        Ok(mbids
            .iter()
            .map(|mbid| RecordingMetadata {
                recording_mbid: mbid.clone(),
                name: mbid.to_uppercase(),
                length_ms: None,
                artist_credit_name: format!("artist of {mbid}"),
                artist_mbids: vec![format!("artist-{mbid}")],
                release: None,
            })
            .collect())
    }

    fn page(mbids: &[&str]) -> RecommendationsPage {
        RecommendationsPage {
            recommendations: mbids
                .iter()
                .map(|mbid| Recommendation {
                    recording_mbid: mbid.to_string(),
                    score: 0.5,
                    latest_listened_at: None,
                })
                .collect(),
            last_updated: None,
        }
    }

    #[test]
    fn test_several_types_are_joined_without_repeats() {
        let mut api = MockListenBrainzApi::new();
        api.expect_recording_recommendations()
            .returning(|_, kind, _, _| match kind {
                "top" => Ok(page(&["r1", "r2", "r3"])),
                _ => Ok(page(&["r2", "r4"])),
            });
        api.expect_recording_feedback().returning(|_, _| Ok(vec![]));
        api.expect_recording_metadata().returning(|mbids| metadata(mbids));

        let patch = RecsToPlaylistPatch::new(Rc::new(api));
        let mut pipeline = patch
            .create(&args(&["rob", "top, similar", "--count", "10"]))
            .unwrap();
        let playlists = pipeline.generate(&mut PipelineContext::new()).unwrap();

        let mbids: Vec<_> = playlists[0].recordings.iter().map(|r| r.mbid.as_str()).collect();
        assert_eq!(mbids, vec!["r1", "r2", "r3", "r4"]);
    }

    #[test]
    fn test_artist_options_filter_credited_recordings() {
        let mut api = MockListenBrainzApi::new();
        api.expect_recording_recommendations()
            .returning(|_, _, _, _| Ok(page(&["r1", "r2", "r3", "r4"])));
        api.expect_recording_feedback().returning(|_, _| Ok(vec![]));
        api.expect_recording_metadata().returning(|mbids| metadata(mbids));

        let patch = RecsToPlaylistPatch::new(Rc::new(api));
        let mut pipeline = patch
            .create(&args(&[
                "rob",
                "--only-artists",
                "artist-r1,artist-r2,artist-r3",
                "--exclude-artists=artist-r2",
            ]))
            .unwrap();
        let playlists = pipeline.generate(&mut PipelineContext::new()).unwrap();

        let mbids: Vec<_> = playlists[0].recordings.iter().map(|r| r.mbid.as_str()).collect();
        assert_eq!(mbids, vec!["r1", "r3"]);
    }

    #[test]
    fn test_name_comes_from_recommendations() {
        let mut api = MockListenBrainzApi::new();
        api.expect_recording_recommendations()
            .withf(|_, kind, count, _| kind == "similar" && *count == 3)
            .returning(|_, _, _, _| {
                Ok(RecommendationsPage {
                    recommendations: ["r1", "r2", "r3"]
                        .into_iter()
                        .map(|mbid| Recommendation {
                            recording_mbid: mbid.to_string(),
                            score: 0.5,
                            latest_listened_at: None,
                        })
                        .collect(),
                    last_updated: None,
                })
            });
        api.expect_recording_feedback().returning(|_, _| Ok(vec![]));
        api.expect_recording_metadata().returning(|mbids| {
            Ok(mbids
                .iter()
                .map(|mbid| RecordingMetadata {
                    recording_mbid: mbid.clone(),
                    name: mbid.to_uppercase(),
                    length_ms: None,
                    artist_credit_name: "Björk".into(),
                    artist_mbids: vec!["bjork".into()],
                    release: None,
                })
                .collect())
        });

        let patch = RecsToPlaylistPatch::new(Rc::new(api));
        let mut pipeline = patch.create(&args(&["rob", "similar", "--count", "3"])).unwrap();
        let playlists = pipeline.generate(&mut PipelineContext::new()).unwrap();

        assert_eq!(playlists[0].name.as_deref(), Some("Recommended recordings for rob"));
        let mbids: Vec<_> = playlists[0].recordings.iter().map(|r| r.mbid.as_str()).collect();
        assert_eq!(mbids, vec!["r1", "r2", "r3"]);
    }
}
