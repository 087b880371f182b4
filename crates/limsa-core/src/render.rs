//! Rendering of chain graphs for inspection

use std::collections::HashMap;

use petgraph::dot::{Config, Dot};
use petgraph::graph::DiGraph;

use crate::export::GraphDocument;

/// Turns a [`GraphDocument`] into some textual drawing format
pub trait GraphRenderer {
    /// File extension of the output, without the dot
    fn extension(&self) -> &str;

    fn render(&self, graph: &GraphDocument) -> String;
}

/// Graphviz DOT: left-to-right layout, boxed nodes, edges labelled with
/// their per-cycle probability or `Dynamic`
#[derive(Clone, Debug)]
pub struct DotRenderer {
    pub font: String,
    pub edge_font_size: u32,
}

impl Default for DotRenderer {
    fn default() -> Self {
        Self {
            font: "ArialMT".to_string(),
            edge_font_size: 10,
        }
    }
}

/// Node and edge weights are the labels petgraph writes out
fn label_graph(document: &GraphDocument) -> DiGraph<&str, &str> {
    let mut graph = DiGraph::new();
    let nodes: HashMap<&str, _> = document
        .nodes
        .iter()
        .map(|node| (node.name.as_str(), graph.add_node(node.name.as_str())))
        .collect();

    for edge in &document.edges {
        let from = nodes.get(edge.from.as_str());
        let to = nodes.get(edge.to.as_str());
        if let (Some(&from), Some(&to)) = (from, to) {
            graph.add_edge(from, to, edge.label.as_str());
        }
    }
    graph
}

impl GraphRenderer for DotRenderer {
    fn extension(&self) -> &str {
        "dot"
    }

    fn render(&self, document: &GraphDocument) -> String {
        let graph = label_graph(document);
        let body = Dot::with_config(&graph, &[Config::GraphContentOnly]);

        let mut out = String::from("digraph {\n    rankdir=LR\n");
        out.push_str(&format!(
            "    node [ shape=box fontname=\"{}\" ]\n",
            self.font
        ));
        out.push_str(&format!(
            "    edge [ fontname=\"{}\" fontsize={} ]\n",
            self.font, self.edge_font_size
        ));
        out.push_str(&body.to_string());
        out.push_str("}\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{GraphEdge, GraphNode};
    use crate::types::StateId;

    fn treatment_graph() -> GraphDocument {
        GraphDocument {
            chain: "TB treatment".to_string(),
            initial_state: Some("Uninfected".to_string()),
            terminal_state: None,
            nodes: vec![
                GraphNode {
                    id: StateId(1),
                    name: "Uninfected".to_string(),
                },
                GraphNode {
                    id: StateId(2),
                    name: "Untreated - Latent".to_string(),
                },
            ],
            edges: vec![GraphEdge {
                from: "Uninfected".to_string(),
                to: "Untreated - Latent".to_string(),
                tp_base: None,
                label: "Dynamic".to_string(),
            }],
        }
    }

    #[test]
    fn test_dot_output() {
        let dot = DotRenderer::default().render(&treatment_graph());
        assert!(dot.starts_with("digraph {\n"));
        assert!(dot.contains("rankdir=LR"));
        assert!(dot.contains("shape=box fontname=\"ArialMT\""));
        assert!(dot.contains("fontsize=10"));
        assert!(dot.contains("label = \"Uninfected\""));
        assert!(dot.contains("label = \"Untreated - Latent\""));
        assert!(dot.contains("0 -> 1"));
        assert!(dot.contains("label = \"Dynamic\""));
        assert!(dot.trim_end().ends_with('}'));
        assert_eq!(dot.matches("digraph").count(), 1);
    }

    #[test]
    fn test_quotes_in_names_are_escaped() {
        let mut graph = treatment_graph();
        graph.nodes[0].name = "say \"hi\"".to_string();
        graph.edges[0].from = "say \"hi\"".to_string();
        let dot = DotRenderer::default().render(&graph);
        assert!(dot.contains("label = \"say \\\"hi\\\"\""));
        assert!(dot.contains("0 -> 1"));
    }

    #[test]
    fn test_edges_to_unknown_nodes_are_skipped() {
        let mut graph = treatment_graph();
        graph.edges[0].to = "Treated".to_string();
        let dot = DotRenderer::default().render(&graph);
        assert!(!dot.contains("->"));
    }
}
