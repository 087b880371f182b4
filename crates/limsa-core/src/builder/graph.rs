use tracing::debug;

use super::ModelBuilder;
use crate::error::{ModelError, Result};
use crate::store::ModelStore;
use crate::types::{Chain, State};

impl<S: ModelStore + ?Sized> ModelBuilder<'_, S> {
    /// Create a chain; names are unique across the model
    pub fn create_chain(&mut self, name: &str) -> Result<Chain> {
        if self.store.chain_by_name(name)?.is_some() {
            return Err(ModelError::DuplicateChain(name.to_string()));
        }
        let chain = self.store.create_chain(name)?;
        debug!(chain = %chain.name, id = %chain.id, "Chain created");
        Ok(chain)
    }

    pub fn find_chain(&self, name: &str) -> Result<Chain> {
        self.store
            .chain_by_name(name)?
            .ok_or_else(|| ModelError::ChainNotFound(name.to_string()))
    }

    /// Add a state to `chain`; names are unique within a chain only
    pub fn add_state(&mut self, chain: &Chain, name: &str) -> Result<State> {
        if self.store.state_by_name(chain.id, name)?.is_some() {
            return Err(ModelError::DuplicateState {
                chain: chain.name.clone(),
                state: name.to_string(),
            });
        }
        let state = self.store.create_state(chain.id, name)?;
        debug!(chain = %chain.name, state = %state.name, "State added");
        Ok(state)
    }

    pub fn find_state(&self, chain: &Chain, name: &str) -> Result<State> {
        self.store
            .state_by_name(chain.id, name)?
            .ok_or_else(|| ModelError::state_not_found(&chain.name, name))
    }

    /// Mark the entry state of `chain`
    pub fn set_initial_state(&mut self, chain: &Chain, state: &State) -> Result<Chain> {
        self.ensure_member(chain, state)?;
        let mut updated = self.current_chain(chain)?;
        updated.initial_state = Some(state.id);
        self.store.update_chain(&updated)?;
        Ok(updated)
    }

    /// Mark the absorbing death state of `chain`, replacing any previous one
    pub fn set_terminal_state(&mut self, chain: &Chain, state: &State) -> Result<Chain> {
        self.ensure_member(chain, state)?;
        let mut updated = self.current_chain(chain)?;
        updated.terminal_state = Some(state.id);
        self.store.update_chain(&updated)?;
        Ok(updated)
    }

    fn ensure_member(&self, chain: &Chain, state: &State) -> Result<()> {
        if state.chain == chain.id {
            return Ok(());
        }
        Err(ModelError::CrossChainEdge {
            chain: chain.name.clone(),
            from: state.name.clone(),
            to: state.name.clone(),
        })
    }

    /// The stored version of `chain`; callers may hold a stale copy
    fn current_chain(&self, chain: &Chain) -> Result<Chain> {
        self.store
            .chain(chain.id)?
            .ok_or_else(|| ModelError::ChainNotFound(chain.name.clone()))
    }
}
