//! Storage collaborator for model entities
//!
//! ## Table of Contents
//! - **ModelStore**: trait every storage backend implements
//! - **ModelSnapshot**: every stored entity, loaded at once for validation/export
//! - **MemoryStore**: in-memory store (default, used by tests)
//!
//! Stores assign ids, commit each write on its own and know nothing about
//! uniqueness rules; those belong to [`ModelBuilder`](crate::ModelBuilder).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{
    Chain, ChainId, EntityKey, EntityKind, Interaction, InteractionId, NewInteraction,
    NewRawInput, NewTransition, RawInput, RawInputId, Reference, ReferenceId, State, StateId,
    TransitionId, TransitionProbability,
};

/// Result type alias for storage operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0} does not exist")]
    Missing(EntityKey),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any other backend failure
    #[error("backend error: {0}")]
    Backend(String),
}

/// Trait for entity storage backends.
///
/// Only the create/delete/list operations are required; the filtered queries
/// have default implementations on top of the list operations.
pub trait ModelStore {
    /// Store name for logging
    fn name(&self) -> &str;

    fn create_reference(&mut self, name: &str, bibtex: Option<&str>) -> StoreResult<Reference>;
    fn create_raw_input(&mut self, input: NewRawInput) -> StoreResult<RawInput>;
    fn create_chain(&mut self, name: &str) -> StoreResult<Chain>;
    fn create_state(&mut self, chain: ChainId, name: &str) -> StoreResult<State>;
    fn create_transition(&mut self, transition: NewTransition)
        -> StoreResult<TransitionProbability>;
    fn create_interaction(&mut self, interaction: NewInteraction) -> StoreResult<Interaction>;

    /// Persist the initial/terminal markers of an existing chain
    fn update_chain(&mut self, chain: &Chain) -> StoreResult<()>;

    /// Rewrite the chain back-reference of an existing transition
    fn set_transition_chain(&mut self, id: TransitionId, chain: ChainId) -> StoreResult<()>;

    /// Delete one entity; returns whether it existed
    fn delete(&mut self, key: EntityKey) -> StoreResult<bool>;

    /// Delete every entity of one kind; returns how many were removed
    fn delete_all(&mut self, kind: EntityKind) -> StoreResult<usize>;

    fn references(&self) -> StoreResult<Vec<Reference>>;
    fn raw_inputs(&self) -> StoreResult<Vec<RawInput>>;
    fn chains(&self) -> StoreResult<Vec<Chain>>;
    fn states(&self) -> StoreResult<Vec<State>>;
    fn transitions(&self) -> StoreResult<Vec<TransitionProbability>>;
    fn interactions(&self) -> StoreResult<Vec<Interaction>>;

    fn chain(&self, id: ChainId) -> StoreResult<Option<Chain>> {
        Ok(self.chains()?.into_iter().find(|chain| chain.id == id))
    }

    fn chain_by_name(&self, name: &str) -> StoreResult<Option<Chain>> {
        Ok(self.chains()?.into_iter().find(|chain| chain.name == name))
    }

    fn state(&self, id: StateId) -> StoreResult<Option<State>> {
        Ok(self.states()?.into_iter().find(|state| state.id == id))
    }

    /// States of one chain in insertion order
    fn states_in_chain(&self, chain: ChainId) -> StoreResult<Vec<State>> {
        Ok(self
            .states()?
            .into_iter()
            .filter(|state| state.chain == chain)
            .collect())
    }

    fn state_by_name(&self, chain: ChainId, name: &str) -> StoreResult<Option<State>> {
        Ok(self
            .states()?
            .into_iter()
            .find(|state| state.chain == chain && state.name == name))
    }

    fn transitions_in_chain(&self, chain: ChainId) -> StoreResult<Vec<TransitionProbability>> {
        Ok(self
            .transitions()?
            .into_iter()
            .filter(|tp| tp.chain == chain)
            .collect())
    }

    fn raw_input_by_slug(&self, slug: &str) -> StoreResult<Option<RawInput>> {
        Ok(self.raw_inputs()?.into_iter().find(|input| input.slug == slug))
    }

    fn raw_input_by_name(&self, name: &str) -> StoreResult<Option<RawInput>> {
        Ok(self.raw_inputs()?.into_iter().find(|input| input.name == name))
    }
}

/// Every stored entity, each table ordered by id
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub references: Vec<Reference>,
    pub raw_inputs: Vec<RawInput>,
    pub chains: Vec<Chain>,
    pub states: Vec<State>,
    pub transitions: Vec<TransitionProbability>,
    pub interactions: Vec<Interaction>,
}

impl ModelSnapshot {
    /// Read every table of `store`
    pub fn load<S: ModelStore + ?Sized>(store: &S) -> StoreResult<Self> {
        Ok(Self {
            references: store.references()?,
            raw_inputs: store.raw_inputs()?,
            chains: store.chains()?,
            states: store.states()?,
            transitions: store.transitions()?,
            interactions: store.interactions()?,
        })
    }

    pub fn chain(&self, id: ChainId) -> Option<&Chain> {
        self.chains.iter().find(|chain| chain.id == id)
    }

    pub fn chain_by_name(&self, name: &str) -> Option<&Chain> {
        self.chains.iter().find(|chain| chain.name == name)
    }

    pub fn state(&self, id: StateId) -> Option<&State> {
        self.states.iter().find(|state| state.id == id)
    }

    pub fn reference(&self, id: ReferenceId) -> Option<&Reference> {
        self.references.iter().find(|reference| reference.id == id)
    }

    /// States of one chain in insertion order
    pub fn states_in_chain(&self, chain: ChainId) -> impl Iterator<Item = &State> {
        self.states.iter().filter(move |state| state.chain == chain)
    }

    pub fn transitions_in_chain(
        &self,
        chain: ChainId,
    ) -> impl Iterator<Item = &TransitionProbability> {
        self.transitions.iter().filter(move |tp| tp.chain == chain)
    }

    /// Display name of a state, `#id` when it no longer exists
    pub fn state_name(&self, id: StateId) -> String {
        self.state(id)
            .map(|state| state.name.clone())
            .unwrap_or_else(|| format!("#{}", id))
    }

    /// Display name of a chain, `#id` when it no longer exists
    pub fn chain_name(&self, id: ChainId) -> String {
        self.chain(id)
            .map(|chain| chain.name.clone())
            .unwrap_or_else(|| format!("#{}", id))
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
            && self.raw_inputs.is_empty()
            && self.chains.is_empty()
            && self.states.is_empty()
            && self.transitions.is_empty()
            && self.interactions.is_empty()
    }
}

/// Next id to hand out per table
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct IdCounters {
    reference: u64,
    raw_input: u64,
    chain: u64,
    state: u64,
    transition: u64,
    interaction: u64,
}

impl IdCounters {
    fn slot(&mut self, kind: EntityKind) -> &mut u64 {
        match kind {
            EntityKind::Reference => &mut self.reference,
            EntityKind::RawInput => &mut self.raw_input,
            EntityKind::Chain => &mut self.chain,
            EntityKind::State => &mut self.state,
            EntityKind::Transition => &mut self.transition,
            EntityKind::Interaction => &mut self.interaction,
        }
    }

    /// Ids start at 1, like autoincrement primary keys
    fn next(&mut self, kind: EntityKind) -> u64 {
        let slot = self.slot(kind);
        *slot += 1;
        *slot
    }
}

/// Serializable table set behind [`MemoryStore`]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Tables {
    next_ids: IdCounters,
    entities: ModelSnapshot,
}

impl Tables {
    pub fn entities(&self) -> &ModelSnapshot {
        &self.entities
    }
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Tables,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from previously persisted tables
    pub fn from_tables(tables: Tables) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &Tables {
        &self.tables
    }
}

fn remove_by<T>(items: &mut Vec<T>, matches: impl Fn(&T) -> bool) -> bool {
    let before = items.len();
    items.retain(|item| !matches(item));
    items.len() != before
}

fn drain_all<T>(items: &mut Vec<T>) -> usize {
    let count = items.len();
    items.clear();
    count
}

impl ModelStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn create_reference(&mut self, name: &str, bibtex: Option<&str>) -> StoreResult<Reference> {
        let reference = Reference {
            id: ReferenceId(self.tables.next_ids.next(EntityKind::Reference)),
            name: name.to_string(),
            bibtex: bibtex.map(str::to_string),
        };
        self.tables.entities.references.push(reference.clone());
        Ok(reference)
    }

    fn create_raw_input(&mut self, input: NewRawInput) -> StoreResult<RawInput> {
        let raw_input = RawInput {
            id: RawInputId(self.tables.next_ids.next(EntityKind::RawInput)),
            name: input.name,
            slug: input.slug,
            value: input.bounds.value,
            low: input.bounds.low,
            high: input.bounds.high,
            reference: input.reference,
            derivation: input.derivation,
        };
        self.tables.entities.raw_inputs.push(raw_input.clone());
        Ok(raw_input)
    }

    fn create_chain(&mut self, name: &str) -> StoreResult<Chain> {
        let chain = Chain {
            id: ChainId(self.tables.next_ids.next(EntityKind::Chain)),
            name: name.to_string(),
            initial_state: None,
            terminal_state: None,
        };
        self.tables.entities.chains.push(chain.clone());
        Ok(chain)
    }

    fn create_state(&mut self, chain: ChainId, name: &str) -> StoreResult<State> {
        let state = State {
            id: StateId(self.tables.next_ids.next(EntityKind::State)),
            name: name.to_string(),
            chain,
        };
        self.tables.entities.states.push(state.clone());
        Ok(state)
    }

    fn create_transition(
        &mut self,
        transition: NewTransition,
    ) -> StoreResult<TransitionProbability> {
        let tp = TransitionProbability {
            id: TransitionId(self.tables.next_ids.next(EntityKind::Transition)),
            from_state: transition.from_state,
            to_state: transition.to_state,
            chain: transition.chain,
            rate: transition.rate,
        };
        self.tables.entities.transitions.push(tp.clone());
        Ok(tp)
    }

    fn create_interaction(&mut self, interaction: NewInteraction) -> StoreResult<Interaction> {
        let interaction = Interaction {
            id: InteractionId(self.tables.next_ids.next(EntityKind::Interaction)),
            in_state: interaction.in_state,
            from_state: interaction.from_state,
            to_state: interaction.to_state,
            adjustment: interaction.adjustment,
            effected_chain: interaction.effected_chain,
        };
        self.tables.entities.interactions.push(interaction.clone());
        Ok(interaction)
    }

    fn update_chain(&mut self, chain: &Chain) -> StoreResult<()> {
        let stored = self
            .tables
            .entities
            .chains
            .iter_mut()
            .find(|stored| stored.id == chain.id)
            .ok_or(StoreError::Missing(EntityKey::Chain(chain.id)))?;
        *stored = chain.clone();
        Ok(())
    }

    fn set_transition_chain(&mut self, id: TransitionId, chain: ChainId) -> StoreResult<()> {
        let stored = self
            .tables
            .entities
            .transitions
            .iter_mut()
            .find(|tp| tp.id == id)
            .ok_or(StoreError::Missing(EntityKey::Transition(id)))?;
        stored.chain = chain;
        Ok(())
    }

    fn delete(&mut self, key: EntityKey) -> StoreResult<bool> {
        let entities = &mut self.tables.entities;
        let removed = match key {
            EntityKey::Reference(id) => remove_by(&mut entities.references, |r| r.id == id),
            EntityKey::RawInput(id) => remove_by(&mut entities.raw_inputs, |r| r.id == id),
            EntityKey::Chain(id) => remove_by(&mut entities.chains, |c| c.id == id),
            EntityKey::State(id) => remove_by(&mut entities.states, |s| s.id == id),
            EntityKey::Transition(id) => remove_by(&mut entities.transitions, |t| t.id == id),
            EntityKey::Interaction(id) => remove_by(&mut entities.interactions, |i| i.id == id),
        };
        Ok(removed)
    }

    fn delete_all(&mut self, kind: EntityKind) -> StoreResult<usize> {
        let entities = &mut self.tables.entities;
        let removed = match kind {
            EntityKind::Reference => drain_all(&mut entities.references),
            EntityKind::RawInput => drain_all(&mut entities.raw_inputs),
            EntityKind::Chain => drain_all(&mut entities.chains),
            EntityKind::State => drain_all(&mut entities.states),
            EntityKind::Transition => drain_all(&mut entities.transitions),
            EntityKind::Interaction => drain_all(&mut entities.interactions),
        };
        // Ids are never reused while anything could still point at them; only
        // a fully emptied store numbers from 1 again.
        if entities.is_empty() {
            self.tables.next_ids = IdCounters::default();
        }
        Ok(removed)
    }

    fn references(&self) -> StoreResult<Vec<Reference>> {
        Ok(self.tables.entities.references.clone())
    }

    fn raw_inputs(&self) -> StoreResult<Vec<RawInput>> {
        Ok(self.tables.entities.raw_inputs.clone())
    }

    fn chains(&self) -> StoreResult<Vec<Chain>> {
        Ok(self.tables.entities.chains.clone())
    }

    fn states(&self) -> StoreResult<Vec<State>> {
        Ok(self.tables.entities.states.clone())
    }

    fn transitions(&self) -> StoreResult<Vec<TransitionProbability>> {
        Ok(self.tables.entities.transitions.clone())
    }

    fn interactions(&self) -> StoreResult<Vec<Interaction>> {
        Ok(self.tables.entities.interactions.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_sequential_per_table() {
        let mut store = MemoryStore::new();
        let tb = store.create_chain("TB disease").unwrap();
        let hiv = store.create_chain("HIV disease").unwrap();
        let state = store.create_state(tb.id, "Uninfected").unwrap();
        assert_eq!(tb.id, ChainId(1));
        assert_eq!(hiv.id, ChainId(2));
        assert_eq!(state.id, StateId(1));
    }

    #[test]
    fn test_emptied_store_numbers_from_one() {
        let mut store = MemoryStore::new();
        store.create_chain("TB disease").unwrap();
        store.create_chain("TB treatment").unwrap();
        assert_eq!(store.delete_all(EntityKind::Chain).unwrap(), 2);
        assert!(store.chains().unwrap().is_empty());
        assert_eq!(store.create_chain("TB disease").unwrap().id, ChainId(1));
    }

    #[test]
    fn test_partial_clear_keeps_ids_unique() {
        let mut store = MemoryStore::new();
        let chain = store.create_chain("TB treatment").unwrap();
        let untreated = store.create_state(chain.id, "Untreated - Active").unwrap();
        let treated = store.create_state(chain.id, "Treated").unwrap();
        store
            .create_transition(NewTransition {
                from_state: untreated.id,
                to_state: treated.id,
                chain: chain.id,
                rate: crate::types::TransitionRate::Dynamic,
            })
            .unwrap();

        assert_eq!(store.delete_all(EntityKind::State).unwrap(), 2);
        let death = store.create_state(chain.id, "Death").unwrap();
        let again = store.create_state(chain.id, "Treated").unwrap();

        assert_eq!(death.id, StateId(3));
        assert_eq!(again.id, StateId(4));
        // the leftover transition still names states that no longer exist
        let tp = &store.transitions().unwrap()[0];
        assert!(store.state(tp.from_state).unwrap().is_none());
        assert!(store.state(tp.to_state).unwrap().is_none());
    }

    #[test]
    fn test_filtered_queries() {
        let mut store = MemoryStore::new();
        let tb = store.create_chain("TB disease").unwrap();
        let resistance = store.create_chain("TB resistance").unwrap();
        store.create_state(tb.id, "Uninfected").unwrap();
        store.create_state(resistance.id, "Uninfected").unwrap();
        store.create_state(tb.id, "Death").unwrap();

        let names: Vec<_> = store
            .states_in_chain(tb.id)
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["Uninfected", "Death"]);

        let found = store.state_by_name(resistance.id, "Uninfected").unwrap();
        assert_eq!(found.map(|s| s.chain), Some(resistance.id));
        assert!(store.state_by_name(resistance.id, "Death").unwrap().is_none());
        assert_eq!(
            store.chain_by_name("TB resistance").unwrap().map(|c| c.id),
            Some(resistance.id)
        );
    }

    #[test]
    fn test_delete_single_entity() {
        let mut store = MemoryStore::new();
        let chain = store.create_chain("Setting").unwrap();
        let state = store.create_state(chain.id, "Urban").unwrap();
        assert!(store.delete(EntityKey::State(state.id)).unwrap());
        assert!(!store.delete(EntityKey::State(state.id)).unwrap());
        assert!(store.state(state.id).unwrap().is_none());
    }

    #[test]
    fn test_update_missing_chain() {
        let mut store = MemoryStore::new();
        let ghost = Chain {
            id: ChainId(9),
            name: "ghost".to_string(),
            initial_state: None,
            terminal_state: None,
        };
        assert!(matches!(
            store.update_chain(&ghost),
            Err(StoreError::Missing(EntityKey::Chain(ChainId(9))))
        ));
    }

    #[test]
    fn test_tables_survive_json() {
        let mut store = MemoryStore::new();
        let chain = store.create_chain("HIV risk groups").unwrap();
        store.create_state(chain.id, "Low risk").unwrap();
        let json = serde_json::to_string(store.tables()).unwrap();

        let mut restored = MemoryStore::from_tables(serde_json::from_str(&json).unwrap());
        assert_eq!(restored.tables(), store.tables());
        // counters travel with the tables
        assert_eq!(restored.create_chain("Setting").unwrap().id, ChainId(2));
    }
}
