//! Documents handed to downstream consumers: per-chain graphs, the raw
//! input table and the full [`ModelExport`] the simulation engine reads.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::chain_graph::ChainGraph;
use crate::store::ModelSnapshot;
use crate::types::{Chain, InputBounds, StateId};

/// Edge label used for transitions resolved at simulation time
pub const DYNAMIC_LABEL: &str = "Dynamic";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: StateId,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    /// Per-cycle probability, `None` for dynamic edges
    pub tp_base: Option<f64>,
    /// The number, or `Dynamic`
    pub label: String,
}

/// One chain's transition graph
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub chain: String,
    pub initial_state: Option<String>,
    pub terminal_state: Option<String>,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl GraphDocument {
    pub fn edge(&self, from: &str, to: &str) -> Option<&GraphEdge> {
        self.edges.iter().find(|edge| edge.from == from && edge.to == to)
    }
}

/// An interaction with every id resolved to a name
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InteractionDocument {
    pub in_chain: String,
    pub in_state: String,
    pub effected_chain: String,
    pub from: String,
    pub to: String,
    pub adjustment: f64,
}

/// Everything the simulation engine needs
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelExport {
    pub inputs: BTreeMap<String, InputBounds>,
    pub chains: Vec<GraphDocument>,
    pub interactions: Vec<InteractionDocument>,
}

impl ModelExport {
    pub fn from_snapshot(snapshot: &ModelSnapshot) -> Self {
        Self {
            inputs: export_inputs(snapshot),
            chains: snapshot
                .chains
                .iter()
                .map(|chain| serialize_chain(snapshot, chain))
                .collect(),
            interactions: export_interactions(snapshot),
        }
    }

    pub fn chain(&self, name: &str) -> Option<&GraphDocument> {
        self.chains.iter().find(|chain| chain.chain == name)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Graph of one chain.
///
/// Nodes follow state insertion order. Edges are sorted by the insertion
/// position of their source state, then of their target state, so the
/// document does not depend on transition insertion order. Transitions with
/// an endpoint outside the chain are left out.
pub fn serialize_chain(snapshot: &ModelSnapshot, chain: &Chain) -> GraphDocument {
    let graph = ChainGraph::build(snapshot, chain);

    let nodes = graph
        .states()
        .map(|state| GraphNode {
            id: state.id,
            name: state.name.clone(),
        })
        .collect();

    let edges = graph
        .ordered_transitions()
        .into_iter()
        .map(|tp| {
            let tp_base = tp.tp_base();
            GraphEdge {
                from: snapshot.state_name(tp.from_state),
                to: snapshot.state_name(tp.to_state),
                tp_base,
                label: tp_base
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| DYNAMIC_LABEL.to_string()),
            }
        })
        .collect();

    GraphDocument {
        chain: chain.name.clone(),
        initial_state: chain.initial_state.map(|id| snapshot.state_name(id)),
        terminal_state: chain.terminal_state.map(|id| snapshot.state_name(id)),
        nodes,
        edges,
    }
}

/// Raw inputs keyed by slug
pub fn export_inputs(snapshot: &ModelSnapshot) -> BTreeMap<String, InputBounds> {
    snapshot
        .raw_inputs
        .iter()
        .map(|input| (input.slug.clone(), input.bounds()))
        .collect()
}

fn export_interactions(snapshot: &ModelSnapshot) -> Vec<InteractionDocument> {
    snapshot
        .interactions
        .iter()
        .map(|interaction| InteractionDocument {
            in_chain: snapshot
                .state(interaction.in_state)
                .map(|state| snapshot.chain_name(state.chain))
                .unwrap_or_default(),
            in_state: snapshot.state_name(interaction.in_state),
            effected_chain: snapshot.chain_name(interaction.effected_chain),
            from: snapshot.state_name(interaction.from_state),
            to: snapshot.state_name(interaction.to_state),
            adjustment: interaction.adjustment,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::RateConversion;
    use crate::math_expression::DerivedValue;
    use crate::store::{MemoryStore, ModelStore};
    use crate::types::{InputBounds, NewRawInput};
    use crate::ModelBuilder;

    fn resistance_chain(store: &mut MemoryStore) {
        let mut builder = ModelBuilder::new(store).unwrap();
        let chain = builder.create_chain("TB resistance").unwrap();
        let uninfected = builder.add_state(&chain, "Uninfected").unwrap();
        let susceptible = builder.add_state(&chain, "Fully Susceptible").unwrap();
        let mdr = builder.add_state(&chain, "MDR").unwrap();
        let xdr = builder.add_state(&chain, "XDR").unwrap();
        builder.set_initial_state(&chain, &uninfected).unwrap();

        // inserted out of graph order on purpose
        builder
            .add_static_transition(
                &mdr,
                &xdr,
                DerivedValue::literal(0.030),
                RateConversion::linear(4),
            )
            .unwrap();
        builder.add_dynamic_transition(&uninfected, &susceptible).unwrap();
        builder.add_dynamic_transition(&uninfected, &mdr).unwrap();
        builder
            .add_static_transition(
                &susceptible,
                &mdr,
                DerivedValue::literal(0.0003),
                RateConversion::linear(4),
            )
            .unwrap();
    }

    #[test]
    fn test_edges_sorted_by_state_position() {
        let mut store = MemoryStore::new();
        resistance_chain(&mut store);
        let snapshot = ModelSnapshot::load(&store).unwrap();
        let chain = snapshot.chain_by_name("TB resistance").unwrap();
        let doc = serialize_chain(&snapshot, chain);

        let names: Vec<_> = doc.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["Uninfected", "Fully Susceptible", "MDR", "XDR"]);

        let pairs: Vec<_> = doc
            .edges
            .iter()
            .map(|e| (e.from.as_str(), e.to.as_str()))
            .collect();
        assert_eq!(
            pairs,
            [
                ("Uninfected", "Fully Susceptible"),
                ("Uninfected", "MDR"),
                ("Fully Susceptible", "MDR"),
                ("MDR", "XDR"),
            ]
        );
        assert_eq!(doc.edges[0].label, "Dynamic");
        assert_eq!(doc.edges[0].tp_base, None);
        assert_eq!(doc.edges[3].tp_base, Some(0.030 / 4.0));
        assert_eq!(doc.edges[3].label, (0.030 / 4.0).to_string());
        assert_eq!(doc.initial_state.as_deref(), Some("Uninfected"));
        assert_eq!(doc.terminal_state, None);
    }

    #[test]
    fn test_inputs_are_keyed_by_slug() {
        let mut store = MemoryStore::new();
        let mut builder = ModelBuilder::new(&mut store).unwrap();
        for (name, slug, bounds) in [
            (
                "Proportion of individuals developing slow latent TB",
                "prop_slow",
                InputBounds::new(0.86, 0.75, 0.92),
            ),
            (
                "Proportion of individuals developing fast latent TB",
                "prop_fast",
                InputBounds::new(0.14, 0.08, 0.25),
            ),
        ] {
            builder.add_raw_input(NewRawInput::new(name, slug, bounds)).unwrap();
        }

        let export = ModelExport::from_snapshot(&builder.snapshot().unwrap());
        let slugs: Vec<_> = export.inputs.keys().map(String::as_str).collect();
        assert_eq!(slugs, ["prop_fast", "prop_slow"]);
        assert_eq!(export.inputs["prop_slow"].low, 0.75);
    }

    #[test]
    fn test_edges_stay_inside_the_chain() {
        let mut store = MemoryStore::new();
        let disease = store.create_chain("TB disease").unwrap();
        let treatment = store.create_chain("TB treatment").unwrap();
        let uninfected = store.create_state(disease.id, "Uninfected").unwrap();
        let treated = store.create_state(treatment.id, "Treated").unwrap();
        store
            .create_transition(crate::types::NewTransition {
                from_state: uninfected.id,
                to_state: treated.id,
                chain: disease.id,
                rate: crate::types::TransitionRate::Dynamic,
            })
            .unwrap();

        let snapshot = ModelSnapshot::load(&store).unwrap();
        let doc = serialize_chain(&snapshot, &disease);
        assert_eq!(doc.nodes.len(), 1);
        assert!(doc.edges.is_empty());
    }

    #[test]
    fn test_export_json() {
        let mut store = MemoryStore::new();
        resistance_chain(&mut store);
        let mut builder = ModelBuilder::new(&mut store).unwrap();
        let chain = builder.find_chain("TB resistance").unwrap();
        let uninfected = builder.find_state(&chain, "Uninfected").unwrap();
        let mdr = builder.find_state(&chain, "MDR").unwrap();
        builder
            .declare_interaction(&mdr, &uninfected, &mdr, &chain, 0.02)
            .unwrap();

        let export = ModelExport::from_snapshot(&builder.snapshot().unwrap());
        assert_eq!(export.interactions.len(), 1);
        assert_eq!(export.interactions[0].in_chain, "TB resistance");

        let json = export.to_json().unwrap();
        assert!(json.contains("\"label\": \"Dynamic\""));
        let parsed = ModelExport::from_json(&json).unwrap();
        assert_eq!(parsed.chains[0].nodes, export.chains[0].nodes);
        assert_eq!(parsed.chains[0].edges.len(), 4);
        assert_eq!(parsed.interactions[0].from, "Uninfected");
    }
}
