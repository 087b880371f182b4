use serde::{Deserialize, Serialize};

use super::ids::{ChainId, InteractionId, StateId, TransitionId};
use crate::conversion::RateConversion;

/// One dimension of the compartmental model (e.g. "TB disease")
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chain {
    pub id: ChainId,
    pub name: String,
    /// Entry state new population starts in
    pub initial_state: Option<StateId>,
    /// Absorbing death state for this chain's process
    pub terminal_state: Option<StateId>,
}

/// A compartment within exactly one chain
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub id: StateId,
    pub name: String,
    pub chain: ChainId,
}

/// Where a static per-cycle probability came from
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RateProvenance {
    /// Annual rate before conversion
    pub annual_rate: f64,
    /// Formula the annual rate was computed from, if any
    pub formula: Option<String>,
    /// Raw input slugs the annual rate depends on, sorted
    pub inputs: Vec<String>,
    pub conversion: RateConversion,
}

/// The probability attached to an edge.
///
/// Dynamic edges are resolved by the simulation engine from state occupancy,
/// so nothing is stored for them here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransitionRate {
    Static {
        /// Per-cycle probability, already converted
        tp_base: f64,
        provenance: RateProvenance,
    },
    Dynamic,
}

/// One directed edge of a chain's transition graph for a single cycle
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionProbability {
    pub id: TransitionId,
    pub from_state: StateId,
    pub to_state: StateId,
    /// Always the chain of `from_state`
    pub chain: ChainId,
    pub rate: TransitionRate,
}

impl TransitionProbability {
    pub fn tp_base(&self) -> Option<f64> {
        match &self.rate {
            TransitionRate::Static { tp_base, .. } => Some(*tp_base),
            TransitionRate::Dynamic => None,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self.rate, TransitionRate::Dynamic)
    }

    pub fn provenance(&self) -> Option<&RateProvenance> {
        match &self.rate {
            TransitionRate::Static { provenance, .. } => Some(provenance),
            TransitionRate::Dynamic => None,
        }
    }
}

/// Field values for a transition that has not been stored yet
#[derive(Clone, Debug, PartialEq)]
pub struct NewTransition {
    pub from_state: StateId,
    pub to_state: StateId,
    pub chain: ChainId,
    pub rate: TransitionRate,
}

/// Cross-chain coupling: while population occupies `in_state`, the edge
/// `from_state -> to_state` of `effected_chain` is adjusted by `adjustment`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: InteractionId,
    pub in_state: StateId,
    pub from_state: StateId,
    pub to_state: StateId,
    /// Signed; positive raises the affected rate
    pub adjustment: f64,
    pub effected_chain: ChainId,
}

/// Field values for an interaction that has not been stored yet
#[derive(Clone, Debug, PartialEq)]
pub struct NewInteraction {
    pub in_state: StateId,
    pub from_state: StateId,
    pub to_state: StateId,
    pub adjustment: f64,
    pub effected_chain: ChainId,
}
