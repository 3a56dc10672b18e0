//! Data-source and lookup stages backed by the ListenBrainz API.
//!
//! Lookups write these annotation keys:
//! - `RecentListensTimestampLookup`: `last-listened-at`
//! - `ListensFeedbackLookup`: `feedback-score`
//! - `UserRecordingRecommendationsElement`: `recommendation-score`, `last-listened-at`

use super::element::{BoxedElement, Element, PipelineContext, Sources};
use crate::client::ListenBrainzApi;
use crate::error::Result;
use crate::models::{Entity, EntityList};
use crate::playlist::PlaylistTitle;
use chrono::Duration;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::rc::Rc;

/// Number of recommendations fetched per request
pub const BATCH_SIZE_RECS: usize = 100;
/// Recommendations available per user on the server
pub const MAX_RECS_LIMIT: usize = 1000;
const FEEDBACK_BATCH_SIZE: usize = 100;
const METADATA_BATCH_SIZE: usize = 500;

/// Leaf stage emitting a fixed list
pub struct RecordingListElement {
    entities: EntityList,
}

impl RecordingListElement {
    pub fn new(entities: EntityList) -> Self {
        Self { entities }
    }
}

impl Element for RecordingListElement {
    type Output = EntityList;

    fn name(&self) -> &'static str {
        "recording-list"
    }

    fn generate(&mut self, _ctx: &mut PipelineContext) -> Result<EntityList> {
        Ok(self.entities.clone())
    }
}

/// Joins the output of several sources, in declared order
pub struct ConcatElement {
    sources: Sources,
}

impl ConcatElement {
    pub fn new() -> Self {
        Self {
            sources: Sources::many(),
        }
    }
}

impl Default for ConcatElement {
    fn default() -> Self {
        Self::new()
    }
}

impl Element for ConcatElement {
    type Output = EntityList;

    fn name(&self) -> &'static str {
        "concat"
    }

    fn set_sources(&mut self, sources: Vec<BoxedElement>) -> Result<()> {
        self.sources.attach(self.name(), sources)
    }

    fn generate(&mut self, ctx: &mut PipelineContext) -> Result<EntityList> {
        let inputs = self.sources.pull_all(self.name(), ctx)?;
        Ok(inputs.into_iter().flatten().collect())
    }
}

/// Leaf stage fetching a user's recommended recordings, best first
pub struct UserRecordingRecommendationsElement {
    api: Rc<dyn ListenBrainzApi>,
    user_name: String,
    artist_type: String,
    count: usize,
}

impl UserRecordingRecommendationsElement {
    pub fn new(
        api: Rc<dyn ListenBrainzApi>,
        user_name: impl Into<String>,
        artist_type: impl Into<String>,
        count: usize,
    ) -> Self {
        Self {
            api,
            user_name: user_name.into(),
            artist_type: artist_type.into(),
            count: count.min(MAX_RECS_LIMIT),
        }
    }
}

impl Element for UserRecordingRecommendationsElement {
    type Output = EntityList;

    fn name(&self) -> &'static str {
        "user-recording-recommendations"
    }

    fn generate(&mut self, ctx: &mut PipelineContext) -> Result<EntityList> {
        let mut entities = Vec::new();
        let mut last_updated = None;

        while entities.len() < self.count {
            let wanted = BATCH_SIZE_RECS.min(self.count - entities.len());
            let page = self.api.recording_recommendations(
                &self.user_name,
                &self.artist_type,
                wanted,
                entities.len(),
            )?;
            last_updated = last_updated.or(page.last_updated);

            let received = page.recommendations.len();
            for rec in page.recommendations {
                let mut entity = Entity::recording(rec.recording_mbid);
                entity.annotations.recommendation_score = Some(rec.score);
                entity.annotations.last_listened_at = rec.latest_listened_at;
                entities.push(entity);
            }
            if received < wanted {
                break;
            }
        }

        info!(
            "fetched {} {} recommendations for {}",
            entities.len(),
            self.artist_type,
            self.user_name
        );
        if entities.is_empty() {
            ctx.add_feedback(format!(
                "No recommendations are available for user {}.",
                self.user_name
            ));
        }

        let updated = last_updated
            .map(|ts| format!(", generated on {}", ts.format("%Y-%m-%d")))
            .unwrap_or_default();
        ctx.local.insert(PlaylistTitle {
            name: format!("Recommended recordings for {}", self.user_name),
            description: format!(
                "Your {} recommendations from ListenBrainz{updated}.",
                self.artist_type
            ),
        });

        Ok(entities)
    }
}

/// Refreshes `last-listened-at` with the user's listens of the last `days` days
pub struct RecentListensTimestampLookup {
    api: Rc<dyn ListenBrainzApi>,
    user_name: String,
    days: i64,
    sources: Sources,
}

impl RecentListensTimestampLookup {
    pub fn new(api: Rc<dyn ListenBrainzApi>, user_name: impl Into<String>, days: i64) -> Self {
        Self {
            api,
            user_name: user_name.into(),
            days,
            sources: Sources::single(),
        }
    }
}

impl Element for RecentListensTimestampLookup {
    type Output = EntityList;

    fn name(&self) -> &'static str {
        "recent-listens-lookup"
    }

    fn set_sources(&mut self, sources: Vec<BoxedElement>) -> Result<()> {
        self.sources.attach(self.name(), sources)
    }

    fn generate(&mut self, ctx: &mut PipelineContext) -> Result<EntityList> {
        let mut entities = self.sources.pull_one(self.name(), ctx)?;
        if entities.is_empty() {
            return Ok(entities);
        }

        let since = ctx.started_at - Duration::days(self.days);
        let listens = self.api.recent_listens(
            &self.user_name,
            since,
            crate::client::MAX_LISTENS_PER_REQUEST,
        )?;
        debug!("{} listens since {since}", listens.len());

        let mut latest = HashMap::new();
        for listen in listens {
            latest
                .entry(listen.recording_mbid)
                .and_modify(|ts| {
                    if listen.listened_at > *ts {
                        *ts = listen.listened_at;
                    }
                })
                .or_insert(listen.listened_at);
        }

        for entity in &mut entities {
            if let Some(&listened_at) = latest.get(&entity.mbid) {
                let current = entity.annotations.last_listened_at;
                if current.is_none_or(|ts| listened_at > ts) {
                    entity.annotations.last_listened_at = Some(listened_at);
                }
            }
        }
        Ok(entities)
    }
}

/// Annotates `feedback-score` from the user's loved/hated feedback
pub struct ListensFeedbackLookup {
    api: Rc<dyn ListenBrainzApi>,
    user_name: String,
    sources: Sources,
}

impl ListensFeedbackLookup {
    pub fn new(api: Rc<dyn ListenBrainzApi>, user_name: impl Into<String>) -> Self {
        Self {
            api,
            user_name: user_name.into(),
            sources: Sources::single(),
        }
    }
}

impl Element for ListensFeedbackLookup {
    type Output = EntityList;

    fn name(&self) -> &'static str {
        "listens-feedback-lookup"
    }

    fn set_sources(&mut self, sources: Vec<BoxedElement>) -> Result<()> {
        self.sources.attach(self.name(), sources)
    }

    fn generate(&mut self, ctx: &mut PipelineContext) -> Result<EntityList> {
        let mut entities = self.sources.pull_one(self.name(), ctx)?;

        let mut scores = HashMap::new();
        let mbids: Vec<String> = entities.iter().map(|e| e.mbid.clone()).collect();
        for chunk in mbids.chunks(FEEDBACK_BATCH_SIZE) {
            for feedback in self.api.recording_feedback(&self.user_name, chunk)? {
                scores.insert(feedback.recording_mbid, feedback.score);
            }
        }

        for entity in &mut entities {
            if let Some(&score) = scores.get(&entity.mbid) {
                entity.annotations.feedback_score = Some(score);
            }
        }
        Ok(entities)
    }
}

/// Fills in recording names, artist credits and releases.
/// Recordings unknown to the metadata service, or known without a name, are
/// dropped; order is kept.
pub struct RecordingLookupElement {
    api: Rc<dyn ListenBrainzApi>,
    sources: Sources,
}

impl RecordingLookupElement {
    pub fn new(api: Rc<dyn ListenBrainzApi>) -> Self {
        Self {
            api,
            sources: Sources::single(),
        }
    }
}

impl Element for RecordingLookupElement {
    type Output = EntityList;

    fn name(&self) -> &'static str {
        "recording-lookup"
    }

    fn set_sources(&mut self, sources: Vec<BoxedElement>) -> Result<()> {
        self.sources.attach(self.name(), sources)
    }

    fn generate(&mut self, ctx: &mut PipelineContext) -> Result<EntityList> {
        let entities = self.sources.pull_one(self.name(), ctx)?;

        let mbids: Vec<String> = entities
            .iter()
            .filter(|e| e.is_recording())
            .map(|e| e.mbid.clone())
            .collect();
        let mut metadata = HashMap::new();
        for chunk in mbids.chunks(METADATA_BATCH_SIZE) {
            for row in self.api.recording_metadata(chunk)? {
                metadata.insert(row.recording_mbid.clone(), row);
            }
        }

        let before = entities.len();
        let mut output = Vec::with_capacity(before);
        for mut entity in entities {
            if !entity.is_recording() {
                output.push(entity);
                continue;
            }
            let Some(row) = metadata.remove(&entity.mbid) else {
                continue;
            };
            if row.name.is_empty() {
                warn!("metadata for recording {} has no name, dropping it", entity.mbid);
                continue;
            }
            entity = entity
                .with_name(row.name)
                .with_artist_credit(row.artist_credit_name, row.artist_mbids);
            entity.duration_ms = row.length_ms;
            entity.release = row.release;
            output.push(entity);
        }

        if output.len() < before {
            debug!(
                "dropped {} recordings without metadata",
                before - output.len()
            );
        }
        Ok(output)
    }
}
