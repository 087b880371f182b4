use tracing::{debug, info, warn};

use super::ModelBuilder;
use crate::conversion::RateConversion;
use crate::error::{ModelError, Result};
use crate::math_expression::DerivedValue;
use crate::store::ModelStore;
use crate::types::{
    Chain, NewTransition, RateProvenance, State, TransitionProbability, TransitionRate,
};

impl<S: ModelStore + ?Sized> ModelBuilder<'_, S> {
    /// Add an edge with a known probability.
    ///
    /// `annual_rate` is converted to the cycle length with `conversion`
    /// before it is stored; its formula and input slugs are kept as
    /// provenance.
    pub fn add_static_transition(
        &mut self,
        from: &State,
        to: &State,
        annual_rate: DerivedValue,
        conversion: RateConversion,
    ) -> Result<TransitionProbability> {
        self.ensure_same_chain(from, to)?;

        let label = Self::edge_label(from, to);
        let tp_base = conversion
            .convert(annual_rate.value)
            .map_err(|e| ModelError::invalid_rate(&label, e))?;

        if conversion.is_linear() && annual_rate.value > self.large_rate_threshold {
            warn!(
                edge = %label,
                annual_rate = annual_rate.value,
                conversion = %conversion,
                "Linear conversion of a large annual rate; consider the compounding form"
            );
        }

        let rate = TransitionRate::Static {
            tp_base,
            provenance: RateProvenance {
                annual_rate: annual_rate.value,
                formula: annual_rate.formula,
                inputs: annual_rate.inputs,
                conversion,
            },
        };
        self.insert_transition(from, to, rate)
    }

    /// Add an edge whose probability the simulation engine resolves from occupancy
    pub fn add_dynamic_transition(
        &mut self,
        from: &State,
        to: &State,
    ) -> Result<TransitionProbability> {
        self.ensure_same_chain(from, to)?;
        self.insert_transition(from, to, TransitionRate::Dynamic)
    }

    /// Recompute `chain` on every transition leaving a state of `chain`.
    ///
    /// Transitions get their chain at creation, so this normally repairs
    /// nothing; it exists for stores that were written by other tools.
    /// Returns the number of transitions that were changed.
    pub fn relink_chain_references(&mut self, chain: &Chain) -> Result<usize> {
        let states = self.store.states_in_chain(chain.id)?;
        let mut repaired = 0;
        for tp in self.store.transitions()? {
            let Some(from) = states.iter().find(|state| state.id == tp.from_state) else {
                continue;
            };
            if tp.chain != from.chain {
                self.store.set_transition_chain(tp.id, from.chain)?;
                repaired += 1;
            }
        }
        if repaired > 0 {
            info!(chain = %chain.name, repaired, "Relinked transition chain references");
        }
        Ok(repaired)
    }

    fn ensure_same_chain(&self, from: &State, to: &State) -> Result<()> {
        if from.chain == to.chain {
            return Ok(());
        }
        Err(ModelError::CrossChainEdge {
            chain: self.chain_name(from.chain)?,
            from: from.name.clone(),
            to: format!("{} ({})", to.name, self.chain_name(to.chain)?),
        })
    }

    fn insert_transition(
        &mut self,
        from: &State,
        to: &State,
        rate: TransitionRate,
    ) -> Result<TransitionProbability> {
        let tp = self.store.create_transition(NewTransition {
            from_state: from.id,
            to_state: to.id,
            chain: from.chain,
            rate,
        })?;
        debug!(
            edge = %Self::edge_label(from, to),
            tp_base = ?tp.tp_base(),
            dynamic = tp.is_dynamic(),
            "Transition added"
        );
        Ok(tp)
    }
}

#[cfg(test)]
mod tests {
    use crate::conversion::RateConversion;
    use crate::error::ModelError;
    use crate::math_expression::{DerivedValue, RateExpression};
    use crate::store::{MemoryStore, ModelStore};
    use crate::types::{InputBound, InputBounds, NewRawInput, NewTransition, TransitionRate};
    use crate::ModelBuilder;

    fn quarterly() -> RateConversion {
        RateConversion::linear(4)
    }

    #[test]
    fn test_slow_latent_partition() {
        let mut store = MemoryStore::new();
        let mut builder = ModelBuilder::new(&mut store).unwrap();
        builder
            .add_raw_input(NewRawInput::new(
                "Annual rate at slow latent develop active disease",
                "rate_slow_annual",
                InputBounds::new(0.00013, 0.00010, 0.00030),
            ))
            .unwrap();
        builder
            .add_raw_input(NewRawInput::new(
                "Proportion of active cases that are infectious",
                "prop_infectious",
                InputBounds::new(0.65, 0.50, 0.65),
            ))
            .unwrap();

        let tb = builder.create_chain("TB disease").unwrap();
        let uninfected = builder.add_state(&tb, "Uninfected").unwrap();
        let fast = builder.add_state(&tb, "Fast latent").unwrap();
        let slow = builder.add_state(&tb, "Slow latent").unwrap();
        let infectious = builder.add_state(&tb, "Infectious active").unwrap();

        let annual = builder
            .derive(
                &RateExpression::from_string("rate_slow_annual * prop_infectious".to_string()),
                InputBound::Value,
            )
            .unwrap();
        let tp = builder
            .add_static_transition(&slow, &infectious, annual, quarterly())
            .unwrap();

        assert!(!tp.is_dynamic());
        assert_eq!(tp.tp_base(), Some((0.00013 * 0.65) / 4.0));
        assert!((tp.tp_base().unwrap() - 0.000021125).abs() < 1e-15);
        assert_eq!(tp.chain, tb.id);
        let provenance = tp.provenance().unwrap();
        assert_eq!(provenance.inputs, vec!["prop_infectious", "rate_slow_annual"]);
        assert_eq!(provenance.conversion, quarterly());

        let infection = builder.add_dynamic_transition(&uninfected, &fast).unwrap();
        assert!(infection.is_dynamic());
        assert_eq!(infection.tp_base(), None);
        assert_eq!(infection.rate, TransitionRate::Dynamic);
    }

    #[test]
    fn test_cross_chain_edge_is_rejected() {
        let mut store = MemoryStore::new();
        let mut builder = ModelBuilder::new(&mut store).unwrap();
        let tb = builder.create_chain("TB disease").unwrap();
        let treatment = builder.create_chain("TB treatment").unwrap();
        let active = builder.add_state(&tb, "Infectious active").unwrap();
        let treated = builder.add_state(&treatment, "Treated").unwrap();

        assert!(matches!(
            builder.add_dynamic_transition(&active, &treated),
            Err(ModelError::CrossChainEdge { .. })
        ));
        assert!(matches!(
            builder.add_static_transition(&active, &treated, DerivedValue::literal(0.1), quarterly()),
            Err(ModelError::CrossChainEdge { .. })
        ));
        assert!(store.transitions().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_rate() {
        let mut store = MemoryStore::new();
        let mut builder = ModelBuilder::new(&mut store).unwrap();
        let tb = builder.create_chain("TB disease").unwrap();
        let active = builder.add_state(&tb, "Infectious active").unwrap();
        let death = builder.add_state(&tb, "Death").unwrap();

        let result = builder.add_static_transition(
            &active,
            &death,
            DerivedValue::literal(-0.3),
            quarterly(),
        );
        assert!(matches!(result, Err(ModelError::InvalidRate { .. })));
    }

    #[test]
    fn test_relink_repairs_drifted_chain() {
        let mut store = MemoryStore::new();
        let (tb, treatment) = {
            let mut builder = ModelBuilder::new(&mut store).unwrap();
            let tb = builder.create_chain("TB disease").unwrap();
            let treatment = builder.create_chain("TB treatment").unwrap();
            (tb, treatment)
        };
        let a = store.create_state(tb.id, "Self cure from infectious").unwrap();
        let b = store.create_state(tb.id, "Infectious active").unwrap();
        // written by hand with a wrong back-reference
        store
            .create_transition(NewTransition {
                from_state: a.id,
                to_state: b.id,
                chain: treatment.id,
                rate: TransitionRate::Dynamic,
            })
            .unwrap();

        let mut builder = ModelBuilder::new(&mut store).unwrap();
        assert_eq!(builder.relink_chain_references(&tb).unwrap(), 1);
        assert_eq!(builder.relink_chain_references(&tb).unwrap(), 0);
        assert_eq!(store.transitions_in_chain(tb.id).unwrap().len(), 1);
        assert!(store.transitions_in_chain(treatment.id).unwrap().is_empty());
    }
}
