//! Model definition documents
//!
//! A [`ModelDefinition`] is the source of truth a rebuild reads: every
//! reference, raw input, chain, state, transition and interaction of a model,
//! written as JSON. Missing sections default to empty and missing settings to
//! quarterly linear conversion.

use std::path::Path;

use limsa_core::{RateConversion, RateExpression, DEFAULT_LARGE_RATE_THRESHOLD};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// The Limsa TB model as shipped
pub const BUILTIN_LIMSA_TB: &str = include_str!("../definitions/limsa_tb.json");

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Policy for static transitions that do not name their own
    pub conversion: RateConversion,
    pub large_rate_threshold: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            conversion: RateConversion::default(),
            large_rate_threshold: DEFAULT_LARGE_RATE_THRESHOLD,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferenceDefinition {
    /// Short handle raw inputs cite the reference by
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub bibtex: Option<String>,
}

/// Where a raw input's numbers come from
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputSource {
    Literal { value: f64, low: f64, high: f64 },
    /// Evaluated at each bound over earlier inputs
    Derived { formula: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InputDefinition {
    pub name: String,
    pub slug: String,
    /// Key of a [`ReferenceDefinition`]
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(flatten)]
    pub source: InputSource,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransitionKind {
    Static {
        /// Annual rate: a number, a slug or a formula over slugs
        rate: RateExpression,
        #[serde(default)]
        conversion: Option<RateConversion>,
    },
    Dynamic,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionDefinition {
    pub from: String,
    pub to: String,
    #[serde(flatten)]
    pub kind: TransitionKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChainDefinition {
    pub name: String,
    #[serde(default)]
    pub states: Vec<String>,
    /// Defaults to the first state
    #[serde(default)]
    pub initial: Option<String>,
    /// Defaults to a state named `Death`, if there is one
    #[serde(default)]
    pub terminal: Option<String>,
    #[serde(default)]
    pub transitions: Vec<TransitionDefinition>,
}

impl ChainDefinition {
    pub const DEFAULT_TERMINAL: &'static str = "Death";

    pub fn initial_state(&self) -> Option<&str> {
        self.initial
            .as_deref()
            .or_else(|| self.states.first().map(String::as_str))
    }

    pub fn terminal_state(&self) -> Option<&str> {
        self.terminal.as_deref().or_else(|| {
            self.states
                .iter()
                .map(String::as_str)
                .find(|state| *state == Self::DEFAULT_TERMINAL)
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InteractionDefinition {
    pub in_chain: String,
    pub in_state: String,
    pub effected_chain: String,
    pub from: String,
    pub to: String,
    /// Evaluated like a rate, without conversion
    pub adjustment: RateExpression,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinition {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub references: Vec<ReferenceDefinition>,
    #[serde(default)]
    pub inputs: Vec<InputDefinition>,
    #[serde(default)]
    pub chains: Vec<ChainDefinition>,
    #[serde(default)]
    pub interactions: Vec<InteractionDefinition>,
}

impl ModelDefinition {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The embedded Limsa TB definition
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_LIMSA_TB)
    }

    pub fn chain(&self, name: &str) -> Option<&ChainDefinition> {
        self.chains.iter().find(|chain| chain.name == name)
    }
}
