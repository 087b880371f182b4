//! In-memory transition graph of one chain
//!
//! Nodes are the chain's states in insertion order, edges its transitions.
//! A transition stored under the chain whose endpoints are not both states
//! of that chain never becomes an edge; it is kept aside as a stray so
//! validation can report it and export can leave it out.

use std::collections::{HashMap, HashSet};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, EdgeRef};
use petgraph::Direction;

use crate::store::ModelSnapshot;
use crate::types::{Chain, State, StateId, TransitionProbability};

#[derive(Debug)]
pub struct ChainGraph<'a> {
    graph: DiGraph<&'a State, &'a TransitionProbability>,
    nodes: HashMap<StateId, NodeIndex>,
    stray: Vec<&'a TransitionProbability>,
}

impl<'a> ChainGraph<'a> {
    pub fn build(snapshot: &'a ModelSnapshot, chain: &Chain) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes = HashMap::new();
        for state in snapshot.states_in_chain(chain.id) {
            nodes.insert(state.id, graph.add_node(state));
        }

        let mut stray = Vec::new();
        for tp in snapshot.transitions_in_chain(chain.id) {
            match (nodes.get(&tp.from_state), nodes.get(&tp.to_state)) {
                (Some(&from), Some(&to)) => {
                    graph.add_edge(from, to, tp);
                }
                _ => stray.push(tp),
            }
        }

        Self {
            graph,
            nodes,
            stray,
        }
    }

    /// States in insertion order
    pub fn states(&self) -> impl Iterator<Item = &'a State> + '_ {
        self.graph.node_weights().copied()
    }

    pub fn contains(&self, state: StateId) -> bool {
        self.nodes.contains_key(&state)
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Transitions of this chain with an endpoint outside it
    pub fn stray(&self) -> &[&'a TransitionProbability] {
        &self.stray
    }

    pub fn outgoing(&self, state: StateId) -> Vec<&'a TransitionProbability> {
        match self.nodes.get(&state) {
            Some(&node) => self.graph.edges(node).map(|edge| *edge.weight()).collect(),
            None => Vec::new(),
        }
    }

    pub fn has_incoming(&self, state: StateId) -> bool {
        self.nodes.get(&state).is_some_and(|&node| {
            self.graph
                .neighbors_directed(node, Direction::Incoming)
                .next()
                .is_some()
        })
    }

    /// States reachable from `start`, `start` included
    pub fn reachable_from(&self, start: StateId) -> HashSet<StateId> {
        let mut reachable = HashSet::new();
        if let Some(&start) = self.nodes.get(&start) {
            let mut bfs = Bfs::new(&self.graph, start);
            while let Some(node) = bfs.next(&self.graph) {
                reachable.insert(self.graph[node].id);
            }
        }
        reachable
    }

    /// Edges sorted by the insertion position of their source state, then of
    /// their target state; parallel edges keep their storage order.
    pub fn ordered_transitions(&self) -> Vec<&'a TransitionProbability> {
        let mut edges: Vec<_> = self
            .graph
            .edge_references()
            .map(|edge| (edge.source().index(), edge.target().index(), *edge.weight()))
            .collect();
        edges.sort_by_key(|(from, to, _)| (*from, *to));
        edges.into_iter().map(|(_, _, tp)| tp).collect()
    }
}
