use super::{Patch, PatchArgs};
use crate::error::{PipelineError, Result};
use crate::pipeline::{Element, PipelineContext};
use crate::playlist::{Playlist, PlaylistElement, PlaylistSubmitter};
use log::{info, warn};
use std::path::PathBuf;

/// What to do with the playlists once a patch has run
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub print: bool,
    pub save: bool,
    /// Where saved playlists go; the working directory when unset
    pub save_dir: Option<PathBuf>,
    pub upload: bool,
    pub token: Option<String>,
    pub created_for: Option<String>,
    /// Overrides the name the patch gives its playlists
    pub name: Option<String>,
    pub desc: Option<String>,
    /// Playlists shorter than this are neither saved nor uploaded
    pub min_recordings: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    /// False when the playlist came out shorter than `min_recordings`
    pub completed: bool,
    pub playlists: Vec<Playlist>,
    pub saved: Vec<PathBuf>,
    pub urls: Vec<String>,
    pub feedback: Vec<String>,
}

/// Build the patch's pipeline, run it, then print, save and upload the
/// result as the options ask.
pub fn generate_playlist(
    patch: &dyn Patch,
    args: &PatchArgs,
    options: &RunOptions,
    submitter: &dyn PlaylistSubmitter,
) -> Result<RunOutcome> {
    let token = match (options.upload, options.token.as_deref()) {
        (true, None) => {
            return Err(PipelineError::new(
                "uploading a playlist requires a ListenBrainz token",
            ));
        }
        (true, Some(token)) => Some(token),
        (false, _) => None,
    };

    let mut root = PlaylistElement::new(patch.create(args)?);
    let mut ctx = PipelineContext::new();
    info!("running patch {}", patch.slug());
    root.generate(&mut ctx)?;

    for playlist in root.playlists_mut() {
        if let Some(name) = &options.name {
            playlist.name = Some(name.clone());
        }
        if let Some(desc) = &options.desc {
            playlist.description = Some(desc.clone());
        }
        if let Some(created_for) = &options.created_for {
            playlist.created_for = Some(created_for.clone());
        }
    }

    let mut outcome = RunOutcome {
        playlists: root.playlists().to_vec(),
        feedback: ctx.feedback().to_vec(),
        ..Default::default()
    };

    if let Some(min) = options.min_recordings {
        let long_enough = root
            .playlists()
            .first()
            .is_some_and(|playlist| playlist.recordings.len() >= min);
        if !long_enough {
            warn!("playlist does not have at least {min} recordings, stopping");
            return Ok(outcome);
        }
    }

    if options.print {
        root.print();
    }

    if options.save {
        let dir = options.save_dir.clone().unwrap_or_else(|| PathBuf::from("."));
        outcome.saved = root.save(&dir)?;
    }

    if let Some(token) = token {
        for submitted in root.submit(submitter, token, options.created_for.as_deref()) {
            let (url, playlist) = submitted?;
            info!(
                "submitted '{}': {url}",
                playlist.name.as_deref().unwrap_or_default()
            );
            outcome.urls.push(url);
        }
    }

    outcome.completed = true;
    Ok(outcome)
}
