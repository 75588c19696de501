//! Graph-shaped export of relationship metrics
//!
//! Edges are capped with [`TopNSelector`] and carry a `value` min-max
//! normalized into `[0, 1]` over the retained weights, so the heaviest kept
//! edge renders strongest in either selection order.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::Serialize;

use super::top_n::TopNSelector;
use crate::processors::{CoEditOutput, CoordinationOutput, OwnershipOutput};
use crate::registry::Mappers;

/// Range edge values are normalized into
pub const DISPLAY_RANGE: (f64, f64) = (0.0, 1.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    User,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub weight: f64,
    /// Weight normalized into the display range
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphData {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

struct EdgeInfo {
    source: GraphNode,
    target: GraphNode,
    weight: f64,
}

/// Weight first, names break ties so the selection does not depend on id order
fn edge_order(a: &EdgeInfo, b: &EdgeInfo) -> Ordering {
    a.weight
        .total_cmp(&b.weight)
        .then_with(|| b.source.cmp(&a.source))
        .then_with(|| b.target.cmp(&a.target))
}

/// Keep `size` edges, the heaviest when `descending`, otherwise the lightest.
fn build(edges: impl Iterator<Item = EdgeInfo>, size: usize, descending: bool) -> GraphData {
    let compare = move |a: &EdgeInfo, b: &EdgeInfo| {
        let order = edge_order(a, b);
        if descending {
            order
        } else {
            order.reverse()
        }
    };
    let mut selector = TopNSelector::new(size, compare);
    for edge in edges {
        selector.push(edge);
    }

    let mut selected = selector.normalized(DISPLAY_RANGE, |edge| edge.weight);
    selected.sort_by(|(a, _), (b, _)| compare(b, a));

    let mut nodes = BTreeSet::new();
    let mut graph_edges = Vec::with_capacity(selected.len());
    for (edge, value) in selected {
        graph_edges.push(GraphEdge {
            source: edge.source.id.clone(),
            target: edge.target.id.clone(),
            weight: edge.weight,
            value,
        });
        nodes.insert(edge.source);
        nodes.insert(edge.target);
    }

    GraphData {
        nodes: nodes.into_iter().collect(),
        edges: graph_edges,
    }
}

fn user(mappers: &Mappers, id: u32) -> GraphNode {
    GraphNode {
        id: mappers.user_name(id),
        kind: NodeKind::User,
    }
}

fn file(mappers: &Mappers, id: u32) -> GraphNode {
    GraphNode {
        id: mappers.file_path(id),
        kind: NodeKind::File,
    }
}

/// Developer -> file edges weighted by ownership share
pub fn ownership_graph(output: &OwnershipOutput, mappers: &Mappers, size: usize, descending: bool) -> GraphData {
    let edges = output.developer_knowledge.iter().flat_map(|(user_id, files)| {
        files.iter().map(move |(file_id, share)| EdgeInfo {
            source: user(mappers, *user_id),
            target: file(mappers, *file_id),
            weight: *share,
        })
    });
    build(edges, size, descending)
}

/// File -> file edges weighted by co-edit count
pub fn co_edit_graph(output: &CoEditOutput, mappers: &Mappers, size: usize, descending: bool) -> GraphData {
    let edges = output.adjacency.iter().map(|adjacency| EdgeInfo {
        source: file(mappers, adjacency.first_file),
        target: file(mappers, adjacency.second_file),
        weight: adjacency.weight as f64,
    });
    build(edges, size, descending)
}

/// Developer -> developer edges weighted by coordination need
pub fn coordination_graph(
    output: &CoordinationOutput,
    mappers: &Mappers,
    size: usize,
    descending: bool,
) -> GraphData {
    let edges = output.needs.iter().map(|need| EdgeInfo {
        source: user(mappers, need.first_user),
        target: user(mappers, need.second_user),
        weight: need.weight as f64,
    });
    build(edges, size, descending)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::{CoordinationNeed, FileAdjacency};

    fn mappers() -> Mappers {
        let mappers = Mappers::new();
        for name in ["ann", "ben", "cat"] {
            mappers.users.add(name);
        }
        for path in ["a.rs", "b.rs", "c.rs"] {
            mappers.files.add(path);
        }
        mappers
    }

    #[test]
    fn test_coordination_graph_keeps_heaviest() {
        let mappers = mappers();
        let output = CoordinationOutput {
            needs: vec![
                CoordinationNeed { first_user: 0, second_user: 1, weight: 2 },
                CoordinationNeed { first_user: 0, second_user: 2, weight: 6 },
                CoordinationNeed { first_user: 1, second_user: 2, weight: 4 },
            ],
        };

        let graph = coordination_graph(&output, &mappers, 2, true);
        let edges: Vec<(&str, &str, f64)> = graph
            .edges
            .iter()
            .map(|e| (e.source.as_str(), e.target.as_str(), e.value))
            .collect();
        assert_eq!(edges, vec![("ann", "cat", 1.0), ("ben", "cat", 0.0)]);
        assert_eq!(graph.nodes.len(), 3);
        assert!(graph.nodes.iter().all(|n| n.kind == NodeKind::User));
    }

    #[test]
    fn test_ascending_selection_keeps_lightest() {
        let mappers = mappers();
        let output = CoEditOutput {
            co_edits: Vec::new(),
            adjacency: vec![
                FileAdjacency { first_file: 0, second_file: 1, weight: 9 },
                FileAdjacency { first_file: 0, second_file: 2, weight: 1 },
                FileAdjacency { first_file: 1, second_file: 2, weight: 3 },
            ],
        };

        let graph = co_edit_graph(&output, &mappers, 1, false);
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].weight, 1.0);
        assert_eq!(graph.edges[0].value, 1.0);
        let ids: Vec<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a.rs", "c.rs"]);
    }

    #[test]
    fn test_ascending_values_keep_weight_scale() {
        let mappers = mappers();
        let output = CoordinationOutput {
            needs: vec![
                CoordinationNeed { first_user: 0, second_user: 1, weight: 2 },
                CoordinationNeed { first_user: 0, second_user: 2, weight: 6 },
                CoordinationNeed { first_user: 1, second_user: 2, weight: 4 },
            ],
        };

        let graph = coordination_graph(&output, &mappers, 2, false);
        let edges: Vec<(f64, f64)> = graph.edges.iter().map(|e| (e.weight, e.value)).collect();
        assert_eq!(edges, vec![(2.0, 0.0), (4.0, 1.0)]);
    }

    #[test]
    fn test_ownership_graph_nodes_are_typed() {
        let mappers = mappers();
        let mut output = OwnershipOutput {
            half_life_days: 365.0,
            developer_knowledge: Default::default(),
            file_owners: Default::default(),
        };
        output.developer_knowledge.entry(0).or_default().insert(0, 0.25);
        output.developer_knowledge.entry(1).or_default().insert(0, 0.75);

        let graph = ownership_graph(&output, &mappers, 10, true);
        assert_eq!(graph.edges.len(), 2);
        assert_eq!(graph.edges[0].source, "ben");
        assert!(graph.nodes.contains(&GraphNode { id: "a.rs".to_string(), kind: NodeKind::File }));
        assert!(graph.nodes.contains(&GraphNode { id: "ann".to_string(), kind: NodeKind::User }));
    }
}
