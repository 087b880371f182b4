use tracing::debug;

use super::ModelBuilder;
use crate::conversion::RateError;
use crate::error::{ModelError, Result};
use crate::store::ModelStore;
use crate::types::{Chain, Interaction, NewInteraction, State};

impl<S: ModelStore + ?Sized> ModelBuilder<'_, S> {
    /// Declare that occupancy of `in_state` adjusts `from -> to` in `effected_chain`.
    ///
    /// `from` and `to` must both belong to `effected_chain`; `in_state` may
    /// live in any chain, including `effected_chain` itself. The adjustment
    /// may be any finite number, negative included.
    pub fn declare_interaction(
        &mut self,
        in_state: &State,
        from: &State,
        to: &State,
        effected_chain: &Chain,
        adjustment: f64,
    ) -> Result<Interaction> {
        if !adjustment.is_finite() {
            return Err(ModelError::invalid_rate(
                format!("interaction on {}", Self::edge_label(from, to)),
                RateError::NonFinite(adjustment),
            ));
        }
        if from.chain != effected_chain.id || to.chain != effected_chain.id {
            return Err(ModelError::CrossChainEdge {
                chain: effected_chain.name.clone(),
                from: format!("{} ({})", from.name, self.chain_name(from.chain)?),
                to: format!("{} ({})", to.name, self.chain_name(to.chain)?),
            });
        }

        let interaction = self.store.create_interaction(NewInteraction {
            in_state: in_state.id,
            from_state: from.id,
            to_state: to.id,
            adjustment,
            effected_chain: effected_chain.id,
        })?;
        debug!(
            in_state = %in_state.name,
            edge = %Self::edge_label(from, to),
            chain = %effected_chain.name,
            adjustment,
            "Interaction declared"
        );
        Ok(interaction)
    }
}
