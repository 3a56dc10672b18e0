//! Patches: named, parameterised pipeline blueprints.
//!
//! A patch validates its inputs and wires lookup, filter and assembly stages
//! into a pipeline. Building a pipeline performs no I/O; everything happens
//! once the returned root is generated.

pub mod periodic_jams;
pub mod playlist_from_mbids;
pub mod recs_to_playlist;
pub mod runner;

use crate::client::ListenBrainzApi;
use crate::error::{PipelineError, Result};
use crate::pipeline::BoxedElement;
use crate::playlist::Playlist;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

pub use periodic_jams::PeriodicJamsPatch;
pub use playlist_from_mbids::PlaylistFromMbidsPatch;
pub use recs_to_playlist::RecsToPlaylistPatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Given by position, in schema order
    Argument,
    /// Given as `--name value`
    Option,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType {
    Text,
    Integer,
    /// `YYYY-MM-DD`
    Date,
}

/// One entry of a patch's parameter schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchInput {
    pub name: &'static str,
    pub kind: InputKind,
    pub required: bool,
    pub ty: InputType,
    pub help: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputValue {
    Text(String),
    Integer(i64),
    Date(NaiveDate),
}

/// Inputs checked against a patch's schema
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchArgs {
    values: HashMap<String, InputValue>,
}

impl PatchArgs {
    /// Validate raw command-line words against `schema`
    pub fn parse(schema: &[PatchInput], raw: &[String]) -> Result<Self> {
        let positional: Vec<&PatchInput> = schema
            .iter()
            .filter(|input| input.kind == InputKind::Argument)
            .collect();
        let mut next_positional = positional.iter();
        let mut values = HashMap::new();

        let mut words = raw.iter();
        while let Some(word) = words.next() {
            let (input, text) = if let Some(option) = word.strip_prefix("--") {
                let (key, inline) = match option.split_once('=') {
                    Some((key, value)) => (key, Some(value.to_string())),
                    None => (option, None),
                };
                let input = schema
                    .iter()
                    .find(|input| input.kind == InputKind::Option && option_name(input) == key)
                    .ok_or_else(|| PipelineError::new(format!("unknown option --{key}")))?;
                let text = match inline {
                    Some(text) => text,
                    None => words
                        .next()
                        .cloned()
                        .ok_or_else(|| PipelineError::new(format!("option --{key} needs a value")))?,
                };
                (input, text)
            } else {
                let input = next_positional
                    .next()
                    .ok_or_else(|| PipelineError::new(format!("unexpected argument '{word}'")))?;
                (*input, word.clone())
            };
            values.insert(input.name.to_string(), convert(input, &text)?);
        }

        if let Some(missing) = schema
            .iter()
            .find(|input| input.required && !values.contains_key(input.name))
        {
            return Err(PipelineError::new(format!(
                "missing required input '{}'",
                missing.name
            )));
        }
        Ok(Self { values })
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(InputValue::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(InputValue::Integer(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn date(&self, name: &str) -> Option<NaiveDate> {
        match self.values.get(name) {
            Some(InputValue::Date(date)) => Some(*date),
            _ => None,
        }
    }

    /// A required text input; `parse` has already checked its presence
    pub fn required_text(&self, name: &str) -> Result<&str> {
        self.text(name)
            .ok_or_else(|| PipelineError::new(format!("missing required input '{name}'")))
    }
}

fn option_name(input: &PatchInput) -> String {
    input.name.replace('_', "-")
}

fn convert(input: &PatchInput, text: &str) -> Result<InputValue> {
    match input.ty {
        InputType::Text => Ok(InputValue::Text(text.to_string())),
        InputType::Integer => text.parse().map(InputValue::Integer).map_err(|_| {
            PipelineError::new(format!("input '{}' must be an integer, got '{text}'", input.name))
        }),
        InputType::Date => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map(InputValue::Date)
            .map_err(|_| {
                PipelineError::new(format!(
                    "input '{}' must be a date formatted YYYY-MM-DD, got '{text}'",
                    input.name
                ))
            }),
    }
}

/// A named pipeline blueprint
pub trait Patch {
    /// URL friendly identifier, e.g. `periodic-jams`
    fn slug(&self) -> &'static str;

    /// One-paragraph summary of what the patch makes
    fn description(&self) -> &'static str;

    fn inputs(&self) -> &'static [PatchInput];

    /// Wire the pipeline. Must not perform I/O.
    fn create(&self, args: &PatchArgs) -> Result<BoxedElement<Vec<Playlist>>>;
}

pub type PatchFactory = fn(Rc<dyn ListenBrainzApi>) -> Box<dyn Patch>;

/// Explicit slug → factory table of available patches
#[derive(Default)]
pub struct PatchRegistry {
    factories: BTreeMap<&'static str, PatchFactory>,
}

impl PatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every patch shipped with this crate
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(periodic_jams::SLUG, |api| {
            Box::new(PeriodicJamsPatch::new(api))
        });
        registry.register(playlist_from_mbids::SLUG, |api| {
            Box::new(PlaylistFromMbidsPatch::new(api))
        });
        registry.register(recs_to_playlist::SLUG, |api| {
            Box::new(RecsToPlaylistPatch::new(api))
        });
        registry
    }

    pub fn register(&mut self, slug: &'static str, factory: PatchFactory) {
        self.factories.insert(slug, factory);
    }

    pub fn slugs(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.keys().copied()
    }

    pub fn get(&self, slug: &str, api: Rc<dyn ListenBrainzApi>) -> Option<Box<dyn Patch>> {
        self.factories.get(slug).map(|factory| factory(api))
    }
}
