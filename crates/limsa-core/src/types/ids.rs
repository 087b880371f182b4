use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Identifier of a stored [`Reference`](super::Reference)
    ReferenceId
);
entity_id!(
    /// Identifier of a stored [`RawInput`](super::RawInput)
    RawInputId
);
entity_id!(
    /// Identifier of a stored [`Chain`](super::Chain)
    ChainId
);
entity_id!(
    /// Identifier of a stored [`State`](super::State)
    StateId
);
entity_id!(
    /// Identifier of a stored [`TransitionProbability`](super::TransitionProbability)
    TransitionId
);
entity_id!(
    /// Identifier of a stored [`Interaction`](super::Interaction)
    InteractionId
);

/// The entity tables held by a store
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Reference,
    RawInput,
    Chain,
    State,
    Transition,
    Interaction,
}

impl EntityKind {
    /// Every table, ordered so that dependents come before the entities they point at
    pub const TEARDOWN_ORDER: [EntityKind; 6] = [
        EntityKind::Interaction,
        EntityKind::Transition,
        EntityKind::State,
        EntityKind::Chain,
        EntityKind::RawInput,
        EntityKind::Reference,
    ];
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Reference => "reference",
            EntityKind::RawInput => "raw input",
            EntityKind::Chain => "chain",
            EntityKind::State => "state",
            EntityKind::Transition => "transition",
            EntityKind::Interaction => "interaction",
        };
        f.write_str(name)
    }
}

/// A typed pointer to a single stored entity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EntityKey {
    Reference(ReferenceId),
    RawInput(RawInputId),
    Chain(ChainId),
    State(StateId),
    Transition(TransitionId),
    Interaction(InteractionId),
}

impl EntityKey {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityKey::Reference(_) => EntityKind::Reference,
            EntityKey::RawInput(_) => EntityKind::RawInput,
            EntityKey::Chain(_) => EntityKind::Chain,
            EntityKey::State(_) => EntityKind::State,
            EntityKey::Transition(_) => EntityKind::Transition,
            EntityKey::Interaction(_) => EntityKind::Interaction,
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = match self {
            EntityKey::Reference(id) => id.0,
            EntityKey::RawInput(id) => id.0,
            EntityKey::Chain(id) => id.0,
            EntityKey::State(id) => id.0,
            EntityKey::Transition(id) => id.0,
            EntityKey::Interaction(id) => id.0,
        };
        write!(f, "{} #{}", self.kind(), id)
    }
}
