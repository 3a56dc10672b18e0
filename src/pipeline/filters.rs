use super::element::{BoxedElement, Element, PipelineContext, Sources};
use crate::error::Result;
use crate::models::{ANNOTATION_KEYS_VERSION, AnnotationKey, Entity, EntityList};
use chrono::Duration;
use log::debug;
use std::collections::HashSet;

/// A keep/drop decision over one entity.
///
/// Predicates look only at the entity's identity and annotations and never
/// perform I/O. An entity missing an annotation the predicate reads must be
/// kept, unless the absence itself is what the predicate tests for.
pub trait Predicate {
    fn name(&self) -> &'static str;

    /// Annotation keys this predicate reads
    fn reads(&self) -> &'static [AnnotationKey] {
        &[]
    }

    /// Called once before each pass over an input list
    fn reset(&mut self) {}

    fn keep(&mut self, entity: &Entity, ctx: &PipelineContext) -> bool;
}

/// Single-source element applying a predicate. Retained entities keep their
/// relative order.
pub struct FilterElement<P> {
    predicate: P,
    sources: Sources,
}

impl<P: Predicate> FilterElement<P> {
    pub fn new(predicate: P) -> Self {
        Self {
            predicate,
            sources: Sources::single(),
        }
    }

    /// How many entities lack each annotation key the predicate reads
    pub fn missing_annotations(&self, entities: &[Entity]) -> Vec<(AnnotationKey, usize)> {
        self.predicate
            .reads()
            .iter()
            .map(|&key| {
                let missing = entities.iter().filter(|e| !e.annotations.has(key)).count();
                (key, missing)
            })
            .collect()
    }

    /// Apply the predicate to an already materialised list
    pub fn apply(&mut self, mut entities: EntityList, ctx: &PipelineContext) -> EntityList {
        self.predicate.reset();
        let before = entities.len();
        for (key, missing) in self.missing_annotations(&entities) {
            if missing > 0 {
                debug!(
                    "{}: {missing} of {before} entities lack {key} (annotation keys v{ANNOTATION_KEYS_VERSION})",
                    self.predicate.name()
                );
            }
        }
        entities.retain(|entity| self.predicate.keep(entity, ctx));
        debug!(
            "{}: kept {} of {} entities",
            self.predicate.name(),
            entities.len(),
            before
        );
        entities
    }
}

impl<P: Predicate> Element for FilterElement<P> {
    type Output = EntityList;

    fn name(&self) -> &'static str {
        self.predicate.name()
    }

    fn set_sources(&mut self, sources: Vec<BoxedElement>) -> Result<()> {
        let name = self.predicate.name();
        self.sources.attach(name, sources)
    }

    fn generate(&mut self, ctx: &mut PipelineContext) -> Result<EntityList> {
        let entities = self.sources.pull_one(self.predicate.name(), ctx)?;
        Ok(self.apply(entities, ctx))
    }
}

/// Splits recordings on whether the user ever listened to them.
///
/// With `remove_unlistened` set, only recordings carrying a last-listened-at
/// timestamp survive; otherwise only those without one survive. Absence of
/// the timestamp means "never listened".
pub struct NeverListened {
    pub remove_unlistened: bool,
}

impl Predicate for NeverListened {
    fn name(&self) -> &'static str {
        "never-listened-filter"
    }

    fn reads(&self) -> &'static [AnnotationKey] {
        &[AnnotationKey::LastListenedAt]
    }

    fn keep(&mut self, entity: &Entity, _ctx: &PipelineContext) -> bool {
        let listened = entity.annotations.last_listened_at.is_some();
        listened == self.remove_unlistened
    }
}

pub type NeverListenedFilter = FilterElement<NeverListened>;

impl NeverListenedFilter {
    /// Keep recordings the user has listened to before
    pub fn keep_listened() -> Self {
        FilterElement::new(NeverListened {
            remove_unlistened: true,
        })
    }

    /// Keep recordings the user has never listened to
    pub fn keep_unlistened() -> Self {
        FilterElement::new(NeverListened {
            remove_unlistened: false,
        })
    }
}

/// Drops recordings listened to within the last `min_days` days
pub struct LatestListenedAt {
    pub min_days: i64,
}

impl Predicate for LatestListenedAt {
    fn name(&self) -> &'static str {
        "latest-listened-at-filter"
    }

    fn reads(&self) -> &'static [AnnotationKey] {
        &[AnnotationKey::LastListenedAt]
    }

    fn keep(&mut self, entity: &Entity, ctx: &PipelineContext) -> bool {
        let Some(listened_at) = entity.annotations.last_listened_at else {
            return true;
        };
        listened_at <= ctx.started_at - Duration::days(self.min_days)
    }
}

pub type LatestListenedAtFilter = FilterElement<LatestListenedAt>;

impl LatestListenedAtFilter {
    pub fn days(min_days: i64) -> Self {
        FilterElement::new(LatestListenedAt { min_days })
    }
}

/// Drops recordings the user marked as hated
pub struct HatedRecordings;

impl Predicate for HatedRecordings {
    fn name(&self) -> &'static str {
        "hated-recordings-filter"
    }

    fn reads(&self) -> &'static [AnnotationKey] {
        &[AnnotationKey::FeedbackScore]
    }

    fn keep(&mut self, entity: &Entity, _ctx: &PipelineContext) -> bool {
        entity.annotations.feedback_score != Some(-1)
    }
}

pub type HatedRecordingsFilter = FilterElement<HatedRecordings>;

impl HatedRecordingsFilter {
    pub fn hated() -> Self {
        FilterElement::new(HatedRecordings)
    }
}

/// Keeps (`include`) or drops recordings credited to any of the given artists.
/// Recordings without an artist credit cannot match.
pub struct CreditedArtists {
    pub artist_mbids: HashSet<String>,
    pub include: bool,
}

impl Predicate for CreditedArtists {
    fn name(&self) -> &'static str {
        "artist-credit-filter"
    }

    fn keep(&mut self, entity: &Entity, _ctx: &PipelineContext) -> bool {
        let matches = entity.artist_credit.as_ref().is_some_and(|credit| {
            credit
                .artist_mbids
                .iter()
                .any(|mbid| self.artist_mbids.contains(mbid))
        });
        matches == self.include
    }
}

pub type ArtistCreditFilter = FilterElement<CreditedArtists>;

impl ArtistCreditFilter {
    pub fn include<I: IntoIterator<Item = String>>(artist_mbids: I) -> Self {
        FilterElement::new(CreditedArtists {
            artist_mbids: artist_mbids.into_iter().collect(),
            include: true,
        })
    }

    pub fn exclude<I: IntoIterator<Item = String>>(artist_mbids: I) -> Self {
        FilterElement::new(CreditedArtists {
            artist_mbids: artist_mbids.into_iter().collect(),
            include: false,
        })
    }
}

/// Drops every repeat of an mbid, keeping its first occurrence
#[derive(Default)]
pub struct DuplicateRecordings {
    seen: HashSet<String>,
}

impl Predicate for DuplicateRecordings {
    fn name(&self) -> &'static str {
        "duplicate-recordings-filter"
    }

    fn reset(&mut self) {
        self.seen.clear();
    }

    fn keep(&mut self, entity: &Entity, _ctx: &PipelineContext) -> bool {
        self.seen.insert(entity.mbid.clone())
    }
}

pub type DuplicateRecordingFilter = FilterElement<DuplicateRecordings>;

impl DuplicateRecordingFilter {
    pub fn first_occurrence() -> Self {
        FilterElement::new(DuplicateRecordings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::lookups::RecordingListElement;
    use chrono::{TimeZone, Utc};

    fn ctx() -> PipelineContext {
        PipelineContext::starting_at(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap())
    }

    fn listened(mbid: &str, days_ago: i64) -> Entity {
        let mut rec = Entity::recording(mbid);
        rec.annotations.last_listened_at = Some(ctx().started_at - Duration::days(days_ago));
        rec
    }

    fn mbids(entities: &[Entity]) -> Vec<&str> {
        entities.iter().map(|e| e.mbid.as_str()).collect()
    }

    #[test]
    fn test_keep_unlistened_retains_only_unannotated() {
        let input = vec![listened("heard", 3), Entity::recording("fresh")];
        let mut filter = NeverListenedFilter::keep_unlistened();
        let out = filter.apply(input, &ctx());
        assert_eq!(mbids(&out), vec!["fresh"]);
    }

    #[test]
    fn test_keep_listened_is_the_inverse() {
        let input = vec![listened("heard", 3), Entity::recording("fresh")];
        let mut filter = NeverListenedFilter::keep_listened();
        let out = filter.apply(input, &ctx());
        assert_eq!(mbids(&out), vec!["heard"]);
    }

    #[test]
    fn test_missing_annotations_counts_per_read_key() {
        let input = vec![listened("heard", 3), Entity::recording("fresh"), Entity::recording("new")];
        let filter = NeverListenedFilter::keep_listened();
        assert_eq!(
            filter.missing_annotations(&input),
            vec![(AnnotationKey::LastListenedAt, 2)]
        );
        // predicates reading nothing report nothing
        assert!(DuplicateRecordingFilter::first_occurrence()
            .missing_annotations(&input)
            .is_empty());
    }

    #[test]
    fn test_latest_listened_at_drops_recent_and_keeps_missing() {
        let input = vec![
            listened("yesterday", 1),
            Entity::recording("never"),
            listened("long-ago", 90),
            listened("boundary", 60),
        ];
        let mut filter = LatestListenedAtFilter::days(60);
        let out = filter.apply(input, &ctx());
        assert_eq!(mbids(&out), vec!["never", "long-ago", "boundary"]);
    }

    #[test]
    fn test_hated_filter_keeps_missing_feedback() {
        let mut hated = Entity::recording("hated");
        hated.annotations.feedback_score = Some(-1);
        let mut loved = Entity::recording("loved");
        loved.annotations.feedback_score = Some(1);
        let input = vec![hated, Entity::recording("unknown"), loved];

        let mut filter = HatedRecordingsFilter::hated();
        let out = filter.apply(input, &ctx());
        assert_eq!(mbids(&out), vec!["unknown", "loved"]);
    }

    #[test]
    fn test_artist_credit_include_and_exclude() {
        let input = || {
            vec![
                Entity::recording("r1").with_artist_credit("A", vec!["a".to_string()]),
                Entity::recording("r2"),
                Entity::recording("r3").with_artist_credit("B & A", vec!["b".to_string(), "a".to_string()]),
                Entity::recording("r4").with_artist_credit("C", vec!["c".to_string()]),
            ]
        };

        let mut include = ArtistCreditFilter::include(vec!["a".to_string()]);
        assert_eq!(mbids(&include.apply(input(), &ctx())), vec!["r1", "r3"]);

        let mut exclude = ArtistCreditFilter::exclude(vec!["a".to_string()]);
        assert_eq!(mbids(&exclude.apply(input(), &ctx())), vec!["r2", "r4"]);
    }

    #[test]
    fn test_duplicates_keep_first_occurrence_and_reset_between_runs() {
        let input = || {
            ["a", "b", "a", "c", "b"]
                .into_iter()
                .map(Entity::recording)
                .collect::<Vec<_>>()
        };
        let mut filter = DuplicateRecordingFilter::first_occurrence();
        assert_eq!(mbids(&filter.apply(input(), &ctx())), vec!["a", "b", "c"]);
        assert_eq!(mbids(&filter.apply(input(), &ctx())), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_filters_never_reorder() {
        let input: Vec<Entity> = (0..20)
            .map(|i| {
                let mut rec = Entity::recording(format!("r{i}"));
                if i % 3 == 0 {
                    rec.annotations.feedback_score = Some(-1);
                }
                rec
            })
            .collect();
        let expected: Vec<String> = input
            .iter()
            .filter(|e| e.annotations.feedback_score.is_none())
            .map(|e| e.mbid.clone())
            .collect();

        let mut filter = HatedRecordingsFilter::hated();
        let out = filter.apply(input, &ctx());
        let got: Vec<String> = out.into_iter().map(|e| e.mbid).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_filter_element_pulls_from_source() {
        let mut filter = NeverListenedFilter::keep_unlistened();
        filter
            .set_sources(vec![Box::new(RecordingListElement::new(vec![
                Entity::recording("fresh"),
                listened("heard", 1),
            ]))])
            .unwrap();
        let out = filter.generate(&mut ctx()).unwrap();
        assert_eq!(mbids(&out), vec!["fresh"]);
    }
}
