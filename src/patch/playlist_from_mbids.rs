use super::{InputKind, InputType, Patch, PatchArgs, PatchInput};
use crate::client::ListenBrainzApi;
use crate::error::{PipelineError, Result};
use crate::models::Entity;
use crate::pipeline::filters::DuplicateRecordingFilter;
use crate::pipeline::lookups::{RecordingListElement, RecordingLookupElement};
use crate::pipeline::{BoxedElement, Element};
use crate::playlist::{Playlist, PlaylistMakerConfig, PlaylistMakerElement};
use std::rc::Rc;

pub const SLUG: &str = "playlist-from-mbids";

const DEFAULT_NAME: &str = "Playlist from MBIDs";

const INPUTS: &[PatchInput] = &[PatchInput {
    name: "mbids",
    kind: InputKind::Argument,
    required: true,
    ty: InputType::Text,
    help: "comma separated recording MBIDs, in playlist order",
}];

/// A playlist of the given recordings, in the given order, each once.
/// Recordings MusicBrainz does not know are left out.
pub struct PlaylistFromMbidsPatch {
    api: Rc<dyn ListenBrainzApi>,
}

impl PlaylistFromMbidsPatch {
    pub fn new(api: Rc<dyn ListenBrainzApi>) -> Self {
        Self { api }
    }
}

impl Patch for PlaylistFromMbidsPatch {
    fn slug(&self) -> &'static str {
        SLUG
    }

    fn description(&self) -> &'static str {
        "Make a playlist from a list of recording MBIDs."
    }

    fn inputs(&self) -> &'static [PatchInput] {
        INPUTS
    }

    fn create(&self, args: &PatchArgs) -> Result<BoxedElement<Vec<Playlist>>> {
        let recordings: Vec<Entity> = args
            .required_text("mbids")?
            .split(',')
            .map(str::trim)
            .filter(|mbid| !mbid.is_empty())
            .map(Entity::recording)
            .collect();
        if recordings.is_empty() {
            return Err(PipelineError::new("at least one recording MBID is needed"));
        }

        let mut dedup = DuplicateRecordingFilter::first_occurrence();
        dedup.set_sources(vec![Box::new(RecordingListElement::new(recordings))])?;
        let mut lookup = RecordingLookupElement::new(self.api.clone());
        lookup.set_sources(vec![Box::new(dedup)])?;

        let mut maker = PlaylistMakerElement::new(PlaylistMakerConfig {
            name: Some(DEFAULT_NAME.to_string()),
            patch_slug: Some(SLUG.to_string()),
            ..Default::default()
        })?;
        maker.set_sources(vec![Box::new(lookup)])?;
        Ok(Box::new(maker))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{MockListenBrainzApi, RecordingMetadata};
    use crate::pipeline::PipelineContext;

    fn args(raw: &str) -> PatchArgs {
        PatchArgs::parse(INPUTS, &[raw.to_string()]).unwrap()
    }

    #[test]
    fn test_rejects_empty_list() {
        let patch = PlaylistFromMbidsPatch::new(Rc::new(MockListenBrainzApi::new()));
        assert!(patch.create(&args(" , ,")).is_err());
    }

    #[test]
    fn test_keeps_given_order_once_each() {
        let mut api = MockListenBrainzApi::new();
        api.expect_recording_metadata()
            .withf(|mbids| mbids == ["b", "a", "ghost"])
            .times(1)
            .returning(|mbids| {
                Ok(mbids
                    .iter()
                    .filter(|mbid| *mbid != "ghost")
                    .map(|mbid| RecordingMetadata {
                        recording_mbid: mbid.clone(),
                        name: format!("Song {mbid}"),
                        length_ms: None,
                        artist_credit_name: "Artist".into(),
                        artist_mbids: vec!["artist".into()],
                        release: None,
                    })
                    .collect())
            });

        let patch = PlaylistFromMbidsPatch::new(Rc::new(api));
        let mut pipeline = patch.create(&args("b, a,b,ghost")).unwrap();
        let playlists = pipeline.generate(&mut PipelineContext::new()).unwrap();

        let playlist = &playlists[0];
        assert_eq!(playlist.name.as_deref(), Some("Playlist from MBIDs"));
        let mbids: Vec<_> = playlist.recordings.iter().map(|r| r.mbid.as_str()).collect();
        assert_eq!(mbids, vec!["b", "a"]);
    }
}
