use crate::error::{PipelineError, Result};
use crate::models::EntityList;
use chrono::{DateTime, Utc};
use log::debug;
use std::any::{Any, TypeId};
use std::collections::HashMap;

/// A pipeline stage.
///
/// Nothing runs until a consumer calls [`Element::generate`] on the root; each
/// stage then pulls from its sources depth-first, in declared order, and
/// transforms what it received. Calling `generate` again re-executes the
/// whole chain below it.
pub trait Element {
    type Output;

    /// Stage identity, used to attribute failures
    fn name(&self) -> &'static str;

    /// Attach upstream stages. Leaf stages reject any source.
    fn set_sources(&mut self, sources: Vec<BoxedElement>) -> Result<()> {
        if sources.is_empty() {
            return Ok(());
        }
        Err(PipelineError::in_stage(self.name(), "this element accepts no sources"))
    }

    fn generate(&mut self, ctx: &mut PipelineContext) -> Result<Self::Output>;
}

/// An element producing an entity list; the common source type
pub type BoxedElement<T = EntityList> = Box<dyn Element<Output = T>>;

/// How many sources an element kind accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Single,
    Many,
}

/// The upstream stages of an element together with the count its kind allows
pub struct Sources {
    arity: Arity,
    elements: Vec<BoxedElement>,
}

impl Sources {
    pub fn new(arity: Arity) -> Self {
        Self {
            arity,
            elements: Vec::new(),
        }
    }

    pub fn single() -> Self {
        Self::new(Arity::Single)
    }

    pub fn many() -> Self {
        Self::new(Arity::Many)
    }

    pub fn attach(&mut self, stage: &str, sources: Vec<BoxedElement>) -> Result<()> {
        let accepted = match self.arity {
            Arity::Single => sources.len() == 1,
            Arity::Many => !sources.is_empty(),
        };
        if !accepted {
            return Err(PipelineError::in_stage(
                stage,
                format!(
                    "received {} sources, element accepts {:?}",
                    sources.len(),
                    self.arity
                ),
            ));
        }
        self.elements = sources;
        Ok(())
    }

    /// Pull every source in declared order. The first failure aborts the pull.
    pub fn pull_all(&mut self, stage: &str, ctx: &mut PipelineContext) -> Result<Vec<EntityList>> {
        if self.elements.is_empty() {
            return Err(PipelineError::in_stage(stage, "no sources attached"));
        }
        let mut inputs = Vec::with_capacity(self.elements.len());
        for source in &mut self.elements {
            debug!("{stage}: pulling from {}", source.name());
            let entities = source
                .generate(ctx)
                .map_err(|e| e.at_stage(source.name()))?;
            inputs.push(entities);
        }
        Ok(inputs)
    }

    /// Pull the one source of a single-source element
    pub fn pull_one(&mut self, stage: &str, ctx: &mut PipelineContext) -> Result<EntityList> {
        let mut inputs = self.pull_all(stage, ctx)?;
        inputs
            .pop()
            .ok_or_else(|| PipelineError::in_stage(stage, "no sources attached"))
    }
}

/// Run-scoped storage shared by all stages.
///
/// Keys are types: a stage declares its own key type, which namespaces it.
/// Any later stage can read it; writes are last-wins.
#[derive(Default)]
pub struct LocalStorage {
    values: HashMap<TypeId, Box<dyn Any>>,
}

impl LocalStorage {
    /// Store `value`, returning the previous value of the same type
    pub fn insert<T: 'static>(&mut self, value: T) -> Option<T> {
        self.values
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old)
    }

    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }
}

/// State of one pipeline run, handed by mutable reference to every stage
pub struct PipelineContext {
    /// Reference time for every time-relative decision in the run
    pub started_at: DateTime<Utc>,
    pub local: LocalStorage,
    feedback: Vec<String>,
}

impl PipelineContext {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            local: LocalStorage::default(),
            feedback: Vec::new(),
        }
    }

    /// Record a note for the user, shown after the run
    pub fn add_feedback(&mut self, message: impl Into<String>) {
        self.feedback.push(message.into());
    }

    pub fn feedback(&self) -> &[String] {
        &self.feedback
    }
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Entity;

    struct Fixed(Vec<&'static str>);

    impl Element for Fixed {
        type Output = EntityList;

        fn name(&self) -> &'static str {
            "fixed"
        }

        fn generate(&mut self, _ctx: &mut PipelineContext) -> Result<EntityList> {
            Ok(self.0.iter().map(|mbid| Entity::recording(*mbid)).collect())
        }
    }

    struct Failing;

    impl Element for Failing {
        type Output = EntityList;

        fn name(&self) -> &'static str {
            "failing"
        }

        fn generate(&mut self, _ctx: &mut PipelineContext) -> Result<EntityList> {
            Err(PipelineError::new("service unavailable"))
        }
    }

    #[derive(Debug, PartialEq)]
    struct Title(&'static str);

    #[test]
    fn test_single_source_arity_enforced() {
        let mut sources = Sources::single();
        let err = sources
            .attach("filter", vec![Box::new(Fixed(vec![])), Box::new(Fixed(vec![]))])
            .unwrap_err();
        assert_eq!(err.stage.as_deref(), Some("filter"));

        assert!(sources.attach("filter", vec![]).is_err());
        assert!(sources.attach("filter", vec![Box::new(Fixed(vec!["a"]))]).is_ok());
        let mut ctx = PipelineContext::new();
        assert_eq!(sources.pull_one("filter", &mut ctx).unwrap()[0].mbid, "a");
    }

    #[test]
    fn test_leaf_rejects_sources() {
        let mut leaf = Fixed(vec![]);
        assert!(leaf.set_sources(vec![]).is_ok());
        assert!(leaf.set_sources(vec![Box::new(Fixed(vec![]))]).is_err());
    }

    #[test]
    fn test_pull_all_keeps_declared_order() {
        let mut sources = Sources::many();
        sources
            .attach(
                "merge",
                vec![Box::new(Fixed(vec!["a", "b"])), Box::new(Fixed(vec!["c"]))],
            )
            .unwrap();
        let mut ctx = PipelineContext::new();
        let inputs = sources.pull_all("merge", &mut ctx).unwrap();
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0][1].mbid, "b");
        assert_eq!(inputs[1][0].mbid, "c");
    }

    #[test]
    fn test_source_failure_aborts_and_names_stage() {
        let mut sources = Sources::many();
        sources
            .attach("merge", vec![Box::new(Failing), Box::new(Fixed(vec!["a"]))])
            .unwrap();
        let mut ctx = PipelineContext::new();
        let err = sources.pull_all("merge", &mut ctx).unwrap_err();
        assert_eq!(err.stage.as_deref(), Some("failing"));
        assert_eq!(err.cause, "service unavailable");
    }

    #[test]
    fn test_unattached_sources_fail() {
        let mut sources = Sources::single();
        let mut ctx = PipelineContext::new();
        assert!(sources.pull_one("filter", &mut ctx).is_err());
    }

    #[test]
    fn test_local_storage_is_last_wins_and_typed() {
        let mut storage = LocalStorage::default();
        assert_eq!(storage.insert(Title("first")), None);
        assert_eq!(storage.insert(Title("second")), Some(Title("first")));
        assert_eq!(storage.get::<Title>(), Some(&Title("second")));
        assert_eq!(storage.get::<String>(), None);
    }
}
