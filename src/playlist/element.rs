use super::Playlist;
use super::jspf::JspfDocument;
use crate::error::Result;
use crate::pipeline::{BoxedElement, Element, PipelineContext};
use log::{debug, info};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Transport that publishes a playlist and returns its URL
#[cfg_attr(test, mockall::automock)]
pub trait PlaylistSubmitter {
    fn submit(&self, auth_token: &str, playlist: &JspfDocument) -> Result<String>;
}

/// Root of a pipeline run. Executes its playlist-producing source and keeps
/// the resulting playlists for printing, saving and submitting.
pub struct PlaylistElement {
    source: BoxedElement<Vec<Playlist>>,
    playlists: Vec<Playlist>,
}

impl PlaylistElement {
    pub fn new(source: BoxedElement<Vec<Playlist>>) -> Self {
        Self {
            source,
            playlists: Vec::new(),
        }
    }

    pub fn playlists(&self) -> &[Playlist] {
        &self.playlists
    }

    pub fn playlists_mut(&mut self) -> &mut [Playlist] {
        &mut self.playlists
    }

    /// Human-readable summary of every generated playlist
    pub fn render(&self) -> String {
        let mut out = String::new();
        for playlist in &self.playlists {
            let name = playlist.name.as_deref().unwrap_or("[untitled playlist]");
            let _ = writeln!(out, "{name}");
            let _ = writeln!(out, "{}", "=".repeat(name.chars().count()));
            if let Some(description) = &playlist.description {
                let _ = writeln!(out, "{description}");
            }
            if let Some(expires_at) = playlist.expires_at {
                let _ = writeln!(out, "Expires: {}", expires_at.format("%Y-%m-%d %H:%M UTC"));
            }
            let _ = writeln!(out, "{} recordings", playlist.recordings.len());
            for (i, recording) in playlist.recordings.iter().enumerate() {
                let year = recording
                    .release
                    .as_ref()
                    .and_then(|r| r.year)
                    .map(|y| format!(" [{y}]"))
                    .unwrap_or_default();
                let _ = writeln!(
                    out,
                    "  {:>2}. \"{}\" by {}{} ({})",
                    i + 1,
                    recording.display_name(),
                    recording.artist_name(),
                    year,
                    recording.mbid
                );
            }
            out.push('\n');
        }
        out
    }

    pub fn print(&self) {
        if self.playlists.is_empty() {
            println!("No playlists were generated.");
            return;
        }
        print!("{}", self.render());
    }

    /// Write each playlist as `<slug>.jspf` into `dir`. Playlists whose
    /// slugs collide get a numeric suffix, so every playlist gets its own file.
    pub fn save(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(self.playlists.len());
        let mut taken = HashSet::new();
        for (i, playlist) in self.playlists.iter().enumerate() {
            let base = playlist.slug().unwrap_or_else(|| format!("playlist-{}", i + 1));
            let mut slug = base.clone();
            let mut n = 1;
            while !taken.insert(slug.clone()) {
                n += 1;
                slug = format!("{base}-{n}");
            }
            let path = dir.join(format!("{slug}.jspf"));
            let writer = BufWriter::new(File::create(&path)?);
            serde_json::to_writer_pretty(writer, &JspfDocument::from_playlist(playlist, None))?;
            info!("saved playlist to {}", path.display());
            written.push(path);
        }
        Ok(written)
    }

    /// Submit each playlist in turn. Nothing is sent until the iterator is
    /// advanced; each item is the playlist's URL and the playlist itself.
    pub fn submit<'a>(
        &'a self,
        submitter: &'a dyn PlaylistSubmitter,
        auth_token: &'a str,
        created_for: Option<&'a str>,
    ) -> impl Iterator<Item = Result<(String, &'a Playlist)>> + 'a {
        self.playlists.iter().map(move |playlist| {
            let document = JspfDocument::from_playlist(playlist, created_for);
            debug!("submitting '{}'", document.playlist.title);
            submitter
                .submit(auth_token, &document)
                .map(|url| (url, playlist))
        })
    }
}

impl Element for PlaylistElement {
    type Output = Vec<Playlist>;

    fn name(&self) -> &'static str {
        "playlist"
    }

    fn generate(&mut self, ctx: &mut PipelineContext) -> Result<Vec<Playlist>> {
        // A failed run leaves no playlists behind
        self.playlists.clear();
        debug!("playlist: pulling from {}", self.source.name());
        let source = &mut self.source;
        let playlists = source.generate(ctx).map_err(|e| e.at_stage(source.name()))?;
        self.playlists = playlists;
        Ok(self.playlists.clone())
    }
}
