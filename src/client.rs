use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::models::ReleaseRef;
use crate::playlist::jspf::JspfDocument;
use crate::playlist::PlaylistSubmitter;
use chrono::{DateTime, TimeZone, Utc};
use log::{debug, warn};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use ureq::{Agent, Request};
use urlencoding::encode;

/// Upper bound the listens endpoint accepts for a single request
pub const MAX_LISTENS_PER_REQUEST: usize = 1000;

#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub recording_mbid: String,
    pub score: f32,
    pub latest_listened_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecommendationsPage {
    pub recommendations: Vec<Recommendation>,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Listen {
    pub recording_mbid: String,
    pub listened_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecordingFeedback {
    pub recording_mbid: String,
    pub score: i8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordingMetadata {
    pub recording_mbid: String,
    pub name: String,
    pub length_ms: Option<u32>,
    pub artist_credit_name: String,
    pub artist_mbids: Vec<String>,
    pub release: Option<ReleaseRef>,
}

/// The ListenBrainz endpoints the lookup stages depend on
#[cfg_attr(test, mockall::automock)]
pub trait ListenBrainzApi {
    fn recording_recommendations(
        &self,
        user_name: &str,
        artist_type: &str,
        count: usize,
        offset: usize,
    ) -> Result<RecommendationsPage>;

    /// Listens newer than `min_ts`, at most `count` of them
    fn recent_listens(&self, user_name: &str, min_ts: DateTime<Utc>, count: usize)
    -> Result<Vec<Listen>>;

    fn recording_feedback(
        &self,
        user_name: &str,
        recording_mbids: &[String],
    ) -> Result<Vec<RecordingFeedback>>;

    /// Metadata for the given recordings; unknown mbids are simply absent
    fn recording_metadata(&self, recording_mbids: &[String]) -> Result<Vec<RecordingMetadata>>;

    /// Resolve an area name, spelled exactly as in MusicBrainz, to its id
    fn lookup_area(&self, area_name: &str) -> Result<u32>;
}

// Wire formats

#[derive(Debug, Deserialize)]
struct RecommendationsResponse {
    payload: RecommendationsPayload,
}

#[derive(Debug, Deserialize)]
struct RecommendationsPayload {
    #[serde(default)]
    mbids: Vec<RecommendationRow>,
    last_updated: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RecommendationRow {
    recording_mbid: String,
    score: f32,
    latest_listened_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ListensResponse {
    payload: ListensPayload,
}

#[derive(Debug, Deserialize)]
struct ListensPayload {
    #[serde(default)]
    listens: Vec<ListenRow>,
}

#[derive(Debug, Deserialize)]
struct ListenRow {
    listened_at: i64,
    track_metadata: TrackMetadata,
}

#[derive(Debug, Deserialize)]
struct TrackMetadata {
    mbid_mapping: Option<MbidMapping>,
    additional_info: Option<AdditionalInfo>,
}

#[derive(Debug, Deserialize)]
struct MbidMapping {
    recording_mbid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AdditionalInfo {
    recording_mbid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeedbackResponse {
    #[serde(default)]
    feedback: Vec<RecordingFeedback>,
}

#[derive(Debug, Deserialize)]
struct MetadataRow {
    recording: MetadataRecording,
    artist: Option<MetadataArtist>,
    release: Option<MetadataRelease>,
}

#[derive(Debug, Deserialize)]
struct MetadataRecording {
    name: String,
    length: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct MetadataArtist {
    name: String,
    #[serde(default)]
    artists: Vec<MetadataArtistCredit>,
}

#[derive(Debug, Deserialize)]
struct MetadataArtistCredit {
    artist_mbid: String,
}

#[derive(Debug, Deserialize)]
struct MetadataRelease {
    mbid: Option<String>,
    name: String,
    year: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct AreaRow {
    area_id: u32,
}

#[derive(Debug, Deserialize)]
struct CreatePlaylistResponse {
    playlist_mbid: String,
}

fn timestamp(ts: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(ts, 0)
        .single()
        .ok_or_else(|| PipelineError::new(format!("invalid timestamp {ts}")))
}

/// A blocking ListenBrainz API client
pub struct ListenBrainzClient {
    agent: Agent,
    api_url: String,
    web_url: String,
    area_lookup_url: String,
    token: Option<String>,
}

impl ListenBrainzClient {
    pub fn new(config: &Config) -> Self {
        ListenBrainzClient {
            agent: Agent::new(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            web_url: config.web_url.trim_end_matches('/').to_string(),
            area_lookup_url: config.area_lookup_url.clone(),
            token: config.token.clone(),
        }
    }

    fn authorized(&self, request: Request) -> Request {
        match &self.token {
            Some(token) => request.set("Authorization", &format!("Token {token}")),
            None => request,
        }
    }

    fn get(&self, path: &str) -> Request {
        let url = format!("{}{}", self.api_url, path);
        debug!("GET {url}");
        self.authorized(self.agent.get(&url))
    }
}

impl ListenBrainzApi for ListenBrainzClient {
    fn recording_recommendations(
        &self,
        user_name: &str,
        artist_type: &str,
        count: usize,
        offset: usize,
    ) -> Result<RecommendationsPage> {
        let response = self
            .get(&format!("/1/cf/recommendation/user/{}/recording", encode(user_name)))
            .query("artist_type", artist_type)
            .query("count", &count.to_string())
            .query("offset", &offset.to_string())
            .call()?;

        // No recommendations have been computed for this user yet
        if response.status() == 204 {
            return Ok(RecommendationsPage::default());
        }

        let parsed: RecommendationsResponse = response.into_json()?;
        let last_updated = parsed.payload.last_updated.map(timestamp).transpose()?;
        let recommendations = parsed
            .payload
            .mbids
            .into_iter()
            .map(|row| Recommendation {
                recording_mbid: row.recording_mbid,
                score: row.score,
                latest_listened_at: row.latest_listened_at,
            })
            .collect();

        Ok(RecommendationsPage {
            recommendations,
            last_updated,
        })
    }

    fn recent_listens(
        &self,
        user_name: &str,
        min_ts: DateTime<Utc>,
        count: usize,
    ) -> Result<Vec<Listen>> {
        let count = count.min(MAX_LISTENS_PER_REQUEST);
        let parsed: ListensResponse = self
            .get(&format!("/1/user/{}/listens", encode(user_name)))
            .query("min_ts", &min_ts.timestamp().to_string())
            .query("count", &count.to_string())
            .call()?
            .into_json()?;

        if parsed.payload.listens.len() >= count {
            warn!("listen history for {user_name} truncated at {count} listens");
        }

        let mut listens = Vec::with_capacity(parsed.payload.listens.len());
        for row in parsed.payload.listens {
            // Unmapped listens carry no recording mbid and cannot be matched
            let mbid = row
                .track_metadata
                .mbid_mapping
                .and_then(|m| m.recording_mbid)
                .or_else(|| row.track_metadata.additional_info.and_then(|a| a.recording_mbid));
            if let Some(recording_mbid) = mbid {
                listens.push(Listen {
                    recording_mbid,
                    listened_at: timestamp(row.listened_at)?,
                });
            }
        }
        Ok(listens)
    }

    fn recording_feedback(
        &self,
        user_name: &str,
        recording_mbids: &[String],
    ) -> Result<Vec<RecordingFeedback>> {
        let parsed: FeedbackResponse = self
            .get(&format!(
                "/1/feedback/user/{}/get-feedback-for-recordings",
                encode(user_name)
            ))
            .query("recording_mbids", &recording_mbids.join(","))
            .call()?
            .into_json()?;
        Ok(parsed.feedback)
    }

    fn recording_metadata(&self, recording_mbids: &[String]) -> Result<Vec<RecordingMetadata>> {
        let url = format!("{}/1/metadata/recording/", self.api_url);
        debug!("POST {url} ({} recordings)", recording_mbids.len());
        let parsed: HashMap<String, MetadataRow> = self
            .authorized(self.agent.post(&url))
            .send_json(json!({
                "recording_mbids": recording_mbids,
                "inc": "artist release",
            }))?
            .into_json()?;

        Ok(parsed
            .into_iter()
            .map(|(recording_mbid, row)| {
                let (artist_credit_name, artist_mbids) = match row.artist {
                    Some(artist) => (
                        artist.name,
                        artist.artists.into_iter().map(|a| a.artist_mbid).collect(),
                    ),
                    None => (String::new(), Vec::new()),
                };
                let release = row.release.and_then(|release| {
                    release.mbid.map(|mbid| ReleaseRef {
                        mbid,
                        name: release.name,
                        year: release.year,
                    })
                });
                RecordingMetadata {
                    recording_mbid,
                    name: row.recording.name,
                    length_ms: row.recording.length,
                    artist_credit_name,
                    artist_mbids,
                    release,
                }
            })
            .collect())
    }

    fn lookup_area(&self, area_name: &str) -> Result<u32> {
        debug!("POST {} ({area_name})", self.area_lookup_url);
        let response = self
            .agent
            .post(&self.area_lookup_url)
            .send_json(json!([{ "[area]": area_name }]))
            .map_err(|e| PipelineError::new(format!("Cannot lookup area name. {}", PipelineError::from(e).cause)))?;

        let rows: Vec<AreaRow> = response.into_json().map_err(|e| {
            PipelineError::new(format!("Cannot lookup area name, invalid JSON returned: {e}"))
        })?;

        rows.first().map(|row| row.area_id).ok_or_else(|| {
            PipelineError::new(format!(
                "Cannot find area name '{area_name}'. Must be spelled exactly as in MusicBrainz."
            ))
        })
    }
}

impl PlaylistSubmitter for ListenBrainzClient {
    fn submit(&self, auth_token: &str, playlist: &JspfDocument) -> Result<String> {
        let url = format!("{}/1/playlist/create", self.api_url);
        debug!("POST {url} ({})", playlist.playlist.title);
        let created: CreatePlaylistResponse = self
            .agent
            .post(&url)
            .set("Authorization", &format!("Token {auth_token}"))
            .send_json(playlist)?
            .into_json()?;
        Ok(format!("{}/playlist/{}", self.web_url, created.playlist_mbid))
    }
}
