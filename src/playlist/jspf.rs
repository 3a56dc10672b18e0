use super::Playlist;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const RECORDING_URI: &str = "https://musicbrainz.org/recording/";
const ARTIST_URI: &str = "https://musicbrainz.org/artist/";
const RELEASE_URI: &str = "https://musicbrainz.org/release/";
const CREATOR: &str = "playlist-pipeline";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JspfDocument {
    pub playlist: JspfPlaylist,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JspfPlaylist {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
    pub creator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default)]
    pub track: Vec<JspfTrack>,
    pub extension: PlaylistExtensions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistExtensions {
    #[serde(rename = "https://musicbrainz.org/doc/jspf#playlist")]
    pub musicbrainz: MusicBrainzPlaylistExtension,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MusicBrainzPlaylistExtension {
    pub public: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_for: Option<String>,
    #[serde(default)]
    pub additional_metadata: AdditionalMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdditionalMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm_metadata: Option<AlgorithmMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmMetadata {
    pub source_patch: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JspfTrack {
    pub identifier: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    pub extension: TrackExtensions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackExtensions {
    #[serde(rename = "https://musicbrainz.org/doc/jspf#track")]
    pub musicbrainz: MusicBrainzTrackExtension,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MusicBrainzTrackExtension {
    #[serde(default)]
    pub artist_identifiers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_identifier: Option<String>,
}

impl JspfDocument {
    pub fn from_playlist(playlist: &Playlist, created_for: Option<&str>) -> Self {
        let track = playlist
            .recordings
            .iter()
            .map(|recording| JspfTrack {
                identifier: vec![format!("{RECORDING_URI}{}", recording.mbid)],
                title: recording.name.clone(),
                creator: recording.artist_credit.as_ref().map(|c| c.name.clone()),
                album: recording.release.as_ref().map(|r| r.name.clone()),
                duration: recording.duration_ms,
                extension: TrackExtensions {
                    musicbrainz: MusicBrainzTrackExtension {
                        artist_identifiers: recording
                            .artist_credit
                            .iter()
                            .flat_map(|c| c.artist_mbids.iter())
                            .map(|mbid| format!("{ARTIST_URI}{mbid}"))
                            .collect(),
                        release_identifier: recording
                            .release
                            .as_ref()
                            .map(|r| format!("{RELEASE_URI}{}", r.mbid)),
                    },
                },
            })
            .collect();

        JspfDocument {
            playlist: JspfPlaylist {
                title: playlist.name.clone().unwrap_or_default(),
                annotation: playlist.description.clone(),
                creator: CREATOR.to_string(),
                identifier: playlist
                    .mbid
                    .as_ref()
                    .map(|mbid| format!("https://listenbrainz.org/playlist/{mbid}")),
                track,
                extension: PlaylistExtensions {
                    musicbrainz: MusicBrainzPlaylistExtension {
                        public: playlist.is_public,
                        created_for: created_for
                            .map(str::to_string)
                            .or_else(|| playlist.created_for.clone()),
                        additional_metadata: AdditionalMetadata {
                            expires_at: playlist.expires_at,
                            algorithm_metadata: playlist.patch_slug.as_ref().map(|slug| {
                                AlgorithmMetadata {
                                    source_patch: slug.clone(),
                                }
                            }),
                        },
                    },
                },
            },
        }
    }
}
