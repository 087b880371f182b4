//! Construction of chains, states, raw inputs, transitions and interactions.
//!
//! [`ModelBuilder`] is the only writer of model entities. It enforces the
//! uniqueness and same-chain rules before anything reaches the store, and
//! fails fast: any error leaves the store partially written, which is safe
//! because a rebuild always starts by clearing every table.

mod graph;
mod inputs;
mod interactions;
mod transitions;

use tracing::debug;

use crate::conversion::DEFAULT_LARGE_RATE_THRESHOLD;
use crate::error::Result;
use crate::math_expression::InputContext;
use crate::store::{ModelSnapshot, ModelStore};
use crate::types::{ChainId, State};

/// Builds model entities on top of a storage collaborator
pub struct ModelBuilder<'s, S: ModelStore + ?Sized> {
    store: &'s mut S,
    inputs: InputContext,
    large_rate_threshold: f64,
}

impl<'s, S: ModelStore + ?Sized> ModelBuilder<'s, S> {
    /// Create a builder; raw inputs already in the store become visible to formulas
    pub fn new(store: &'s mut S) -> Result<Self> {
        let mut inputs = InputContext::new();
        for input in store.raw_inputs()? {
            inputs.set_input(input.slug.clone(), input.bounds());
        }
        debug!(store = store.name(), inputs = inputs.len(), "Model builder ready");

        Ok(Self {
            store,
            inputs,
            large_rate_threshold: DEFAULT_LARGE_RATE_THRESHOLD,
        })
    }

    /// Annual rate above which a linear conversion is logged as approximate
    pub fn with_large_rate_threshold(mut self, threshold: f64) -> Self {
        self.large_rate_threshold = threshold;
        self
    }

    pub fn store(&self) -> &S {
        &*self.store
    }

    /// Raw input values visible to formulas
    pub fn inputs(&self) -> &InputContext {
        &self.inputs
    }

    /// Load every stored entity
    pub fn snapshot(&self) -> Result<ModelSnapshot> {
        Ok(ModelSnapshot::load(&*self.store)?)
    }

    fn chain_name(&self, id: ChainId) -> Result<String> {
        Ok(self
            .store
            .chain(id)?
            .map(|chain| chain.name)
            .unwrap_or_else(|| format!("#{}", id)))
    }

    fn edge_label(from: &State, to: &State) -> String {
        format!("{} -> {}", from.name, to.name)
    }
}
