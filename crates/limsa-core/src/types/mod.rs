mod graph;
mod ids;
mod inputs;

pub use graph::{
    Chain, Interaction, NewInteraction, NewTransition, RateProvenance, State,
    TransitionProbability, TransitionRate,
};
pub use ids::{
    ChainId, EntityKey, EntityKind, InteractionId, RawInputId, ReferenceId, StateId, TransitionId,
};
pub use inputs::{Derivation, InputBound, InputBounds, NewRawInput, RawInput, Reference};
