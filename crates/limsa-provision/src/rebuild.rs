//! Full rebuild of a model from its definition
//!
//! A rebuild clears every table of the store and recreates the model in
//! causal order: references, raw inputs, chains with their states and
//! markers, transitions, interactions. It then runs the relink sweep,
//! validates and exports. Any construction error aborts the rebuild; the
//! store is then partially written, and the fix is to rebuild again.

use std::collections::HashMap;

use limsa_core::{
    validate_with, Chain, EntityKind, InputBound, InputBounds, MathExpression, ModelBuilder,
    ModelError, ModelExport, ModelStore, NewRawInput, ReferenceId, ValidationConfig,
    ValidationReport,
};
use tracing::{debug, info, warn};

use crate::definitions::{
    ChainDefinition, InputDefinition, InputSource, InteractionDefinition, ModelDefinition,
    ReferenceDefinition, TransitionKind,
};
use crate::error::{ProvisionError, Result};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RebuildOptions {
    /// Point of every raw input's range that transition rates and
    /// interaction adjustments are evaluated at
    pub bound: InputBound,
}

impl RebuildOptions {
    pub fn at(bound: InputBound) -> Self {
        Self { bound }
    }
}

/// What a successful rebuild hands back
#[derive(Clone, Debug, PartialEq)]
pub struct RebuildOutcome {
    pub export: ModelExport,
    pub report: ValidationReport,
}

/// Clear `store` and rebuild `definition` into it
pub fn rebuild<S: ModelStore + ?Sized>(
    definition: &ModelDefinition,
    store: &mut S,
    options: &RebuildOptions,
) -> Result<RebuildOutcome> {
    info!(
        model = %definition.name,
        store = store.name(),
        bound = ?options.bound,
        "Starting rebuild"
    );

    clear(store)?;

    let mut builder = ModelBuilder::new(store)?
        .with_large_rate_threshold(definition.settings.large_rate_threshold);

    let references = provision_references(&mut builder, &definition.references)?;
    provision_inputs(&mut builder, &definition.inputs, &references)?;

    let mut chains = Vec::with_capacity(definition.chains.len());
    for chain_def in &definition.chains {
        chains.push(provision_chain(&mut builder, chain_def)?);
    }
    for (chain, chain_def) in chains.iter().zip(&definition.chains) {
        provision_transitions(&mut builder, definition, chain, chain_def, options)?;
    }
    for interaction in &definition.interactions {
        provision_interaction(&mut builder, interaction, options)?;
    }

    for chain in &chains {
        let repaired = builder.relink_chain_references(chain)?;
        if repaired > 0 {
            warn!(chain = %chain.name, repaired, "Transitions were linked to the wrong chain");
        }
    }

    let snapshot = builder.snapshot()?;
    let report = validate_with(
        &snapshot,
        &ValidationConfig {
            large_rate_threshold: definition.settings.large_rate_threshold,
        },
    );
    for issue in &report.issues {
        debug!(kind = ?issue.kind(), "{}", issue);
    }
    let export = ModelExport::from_snapshot(&snapshot);

    info!(
        model = %definition.name,
        chains = export.chains.len(),
        inputs = export.inputs.len(),
        transitions = snapshot.transitions.len(),
        interactions = export.interactions.len(),
        issues = report.len(),
        "Rebuild complete"
    );

    Ok(RebuildOutcome { export, report })
}

fn clear<S: ModelStore + ?Sized>(store: &mut S) -> Result<()> {
    for kind in EntityKind::TEARDOWN_ORDER {
        let removed = store.delete_all(kind).map_err(ModelError::from)?;
        debug!(kind = %kind, removed, "Cleared table");
    }
    Ok(())
}

fn provision_references<S: ModelStore + ?Sized>(
    builder: &mut ModelBuilder<'_, S>,
    references: &[ReferenceDefinition],
) -> Result<HashMap<String, ReferenceId>> {
    let mut ids = HashMap::with_capacity(references.len());
    for reference in references {
        let stored = builder.add_reference(&reference.name, reference.bibtex.as_deref())?;
        if ids.insert(reference.key.clone(), stored.id).is_some() {
            return Err(ProvisionError::definition(format!(
                "reference key '{}' is used twice",
                reference.key
            )));
        }
    }
    Ok(ids)
}

fn provision_inputs<S: ModelStore + ?Sized>(
    builder: &mut ModelBuilder<'_, S>,
    inputs: &[InputDefinition],
    references: &HashMap<String, ReferenceId>,
) -> Result<()> {
    for input in inputs {
        let reference = match &input.reference {
            Some(key) => Some(*references.get(key).ok_or_else(|| {
                ProvisionError::definition(format!(
                    "raw input '{}' cites unknown reference '{}'",
                    input.slug, key
                ))
            })?),
            None => None,
        };

        match &input.source {
            InputSource::Literal { value, low, high } => {
                let mut new_input = NewRawInput::new(
                    input.name.as_str(),
                    input.slug.as_str(),
                    InputBounds::new(*value, *low, *high),
                );
                new_input.reference = reference;
                builder.add_raw_input(new_input)?;
            }
            InputSource::Derived { formula } => {
                let formula = MathExpression::new(formula.clone());
                builder.add_derived_raw_input(&input.name, &input.slug, &formula, reference)?;
            }
        }
    }
    Ok(())
}

fn provision_chain<S: ModelStore + ?Sized>(
    builder: &mut ModelBuilder<'_, S>,
    definition: &ChainDefinition,
) -> Result<Chain> {
    let mut chain = builder.create_chain(&definition.name)?;
    for state in &definition.states {
        builder.add_state(&chain, state)?;
    }

    if let Some(name) = definition.initial_state() {
        let state = builder.find_state(&chain, name)?;
        chain = builder.set_initial_state(&chain, &state)?;
    }
    if let Some(name) = definition.terminal_state() {
        let state = builder.find_state(&chain, name)?;
        chain = builder.set_terminal_state(&chain, &state)?;
    }

    debug!(chain = %chain.name, states = definition.states.len(), "Chain provisioned");
    Ok(chain)
}

fn provision_transitions<S: ModelStore + ?Sized>(
    builder: &mut ModelBuilder<'_, S>,
    model: &ModelDefinition,
    chain: &Chain,
    definition: &ChainDefinition,
    options: &RebuildOptions,
) -> Result<()> {
    for transition in &definition.transitions {
        let from = builder.find_state(chain, &transition.from)?;
        let to = builder.find_state(chain, &transition.to)?;
        match &transition.kind {
            TransitionKind::Dynamic => {
                builder.add_dynamic_transition(&from, &to)?;
            }
            TransitionKind::Static { rate, conversion } => {
                let annual_rate = builder.derive(rate, options.bound)?;
                let conversion = conversion.unwrap_or(model.settings.conversion);
                builder.add_static_transition(&from, &to, annual_rate, conversion)?;
            }
        }
    }
    Ok(())
}

fn provision_interaction<S: ModelStore + ?Sized>(
    builder: &mut ModelBuilder<'_, S>,
    definition: &InteractionDefinition,
    options: &RebuildOptions,
) -> Result<()> {
    let in_chain = builder.find_chain(&definition.in_chain)?;
    let in_state = builder.find_state(&in_chain, &definition.in_state)?;
    let effected_chain = builder.find_chain(&definition.effected_chain)?;
    // endpoints are looked up in the effected chain, so a misplaced edge is StateNotFound
    let from = builder.find_state(&effected_chain, &definition.from)?;
    let to = builder.find_state(&effected_chain, &definition.to)?;
    let adjustment = builder.derive(&definition.adjustment, options.bound)?;

    builder.declare_interaction(&in_state, &from, &to, &effected_chain, adjustment.value)?;
    Ok(())
}
