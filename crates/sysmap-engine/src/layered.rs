//! Layered ("Sugiyama") layout.
//!
//! Phases:
//!   1. Cycle removal (greedy feedback arc set, reversed)
//!   2. Rank assignment (longest path from the sources)
//!   3. Crossing reduction (barycenter sweeps between adjacent ranks)
//!   4. Coordinate assignment (uniform spacing, ranks centered on one axis)
//!
//! The pass is a pure function of its input: ties are broken by input order,
//! so the same graph always lands on the same coordinates.

use petgraph::algo::{greedy_feedback_arc_set, toposort};
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction::Outgoing;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::LayoutError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RankDir {
    /// Ranks stack downwards.
    #[serde(rename = "TB")]
    TopBottom,
    /// Ranks stack rightwards.
    #[serde(rename = "LR")]
    LeftRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Input to a layered layout: node sizes plus directed edges between node
/// indices.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutGraph {
    pub nodes: Vec<Size>,
    pub edges: Vec<(usize, usize)>,
    pub rank_dir: RankDir,
}

/// Which point of a node's box a layout's coordinates refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOrigin {
    Center,
    TopLeft,
}

/// A layered graph layout algorithm.
///
/// Returns one point per input node, in input order.
pub trait LayeredLayout: Send + Sync {
    fn origin(&self) -> NodeOrigin;
    fn layout(&self, graph: &LayoutGraph) -> Result<Vec<Point>, LayoutError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sugiyama {
    /// Gap between consecutive ranks.
    pub rank_sep: f64,
    /// Gap between neighbours within a rank.
    pub node_sep: f64,
    /// Down + up barycenter passes.
    pub sweeps: usize,
}

impl Default for Sugiyama {
    fn default() -> Self {
        Self {
            rank_sep: 50.0,
            node_sep: 50.0,
            sweeps: 4,
        }
    }
}

impl LayeredLayout for Sugiyama {
    fn origin(&self) -> NodeOrigin {
        NodeOrigin::Center
    }

    fn layout(&self, graph: &LayoutGraph) -> Result<Vec<Point>, LayoutError> {
        let n = graph.nodes.len();
        if n == 0 {
            return Ok(Vec::new());
        }
        if let Some(&(s, t)) = graph.edges.iter().find(|&&(s, t)| s >= n || t >= n) {
            return Err(LayoutError::MalformedGeometry(format!(
                "edge {s} -> {t} out of range for {n} nodes"
            )));
        }

        let edges = acyclic_edges(n, &graph.edges);
        let ranks = assign_ranks(n, &edges)?;
        let layers = self.order_layers(n, &edges, &ranks);
        Ok(self.place(graph, &layers))
    }
}

/// Edge list with self loops dropped and a feedback arc set reversed.
fn acyclic_edges(n: usize, edges: &[(usize, usize)]) -> Vec<(usize, usize)> {
    let mut g: DiGraph<(), ()> = DiGraph::with_capacity(n, edges.len());
    let idx: Vec<NodeIndex> = (0..n).map(|_| g.add_node(())).collect();
    for &(s, t) in edges {
        if s != t {
            g.add_edge(idx[s], idx[t], ());
        }
    }
    let reversed: HashSet<EdgeIndex> = greedy_feedback_arc_set(&g).map(|e| e.id()).collect();
    g.edge_references()
        .map(|e| {
            let (s, t) = (e.source().index(), e.target().index());
            if reversed.contains(&e.id()) {
                (t, s)
            } else {
                (s, t)
            }
        })
        .collect()
}

/// Longest-path ranking: sources sit on rank 0, every edge points to a
/// strictly higher rank.
fn assign_ranks(n: usize, edges: &[(usize, usize)]) -> Result<Vec<usize>, LayoutError> {
    let mut dag: DiGraph<(), ()> = DiGraph::with_capacity(n, edges.len());
    let idx: Vec<NodeIndex> = (0..n).map(|_| dag.add_node(())).collect();
    for &(s, t) in edges {
        dag.add_edge(idx[s], idx[t], ());
    }
    let order = toposort(&dag, None).map_err(|_| LayoutError::Cyclic)?;

    let mut rank = vec![0usize; n];
    for v in order {
        for succ in dag.neighbors_directed(v, Outgoing) {
            rank[succ.index()] = rank[succ.index()].max(rank[v.index()] + 1);
        }
    }
    Ok(rank)
}

impl Sugiyama {
    fn order_layers(&self, n: usize, edges: &[(usize, usize)], ranks: &[usize]) -> Vec<Vec<usize>> {
        let depth = ranks.iter().copied().max().unwrap_or(0) + 1;
        let mut layers: Vec<Vec<usize>> = vec![Vec::new(); depth];
        for v in 0..n {
            layers[ranks[v]].push(v);
        }

        // Only edges between adjacent ranks steer the ordering.
        let mut up: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut down: Vec<Vec<usize>> = vec![Vec::new(); n];
        for &(s, t) in edges {
            if ranks[t] == ranks[s] + 1 {
                down[s].push(t);
                up[t].push(s);
            }
        }

        let mut pos = vec![0usize; n];
        for layer in &layers {
            for (i, &v) in layer.iter().enumerate() {
                pos[v] = i;
            }
        }

        for _ in 0..self.sweeps {
            for l in 1..layers.len() {
                reorder(&mut layers[l], &up, &mut pos);
            }
            for l in (0..layers.len().saturating_sub(1)).rev() {
                reorder(&mut layers[l], &down, &mut pos);
            }
        }
        layers
    }

    fn place(&self, graph: &LayoutGraph, layers: &[Vec<usize>]) -> Vec<Point> {
        // (extent across the rank, extent along the rank axis)
        let extents = |s: Size| match graph.rank_dir {
            RankDir::TopBottom => (s.width, s.height),
            RankDir::LeftRight => (s.height, s.width),
        };

        let mut cross = vec![0.0f64; graph.nodes.len()];
        let mut along = vec![0.0f64; graph.nodes.len()];
        let mut offset = 0.0;
        for layer in layers {
            let thickness = layer
                .iter()
                .map(|&v| extents(graph.nodes[v]).1)
                .fold(0.0, f64::max);
            let total: f64 = layer.iter().map(|&v| extents(graph.nodes[v]).0).sum::<f64>()
                + self.node_sep * layer.len().saturating_sub(1) as f64;
            let mut start = -total / 2.0;
            for &v in layer {
                let width = extents(graph.nodes[v]).0;
                cross[v] = start + width / 2.0;
                along[v] = offset + thickness / 2.0;
                start += width + self.node_sep;
            }
            offset += thickness + self.rank_sep;
        }

        // Shift so the leftmost box edge sits at zero.
        let min_edge = (0..graph.nodes.len())
            .map(|v| cross[v] - extents(graph.nodes[v]).0 / 2.0)
            .fold(f64::INFINITY, f64::min);
        (0..graph.nodes.len())
            .map(|v| {
                let c = cross[v] - min_edge;
                match graph.rank_dir {
                    RankDir::TopBottom => Point { x: c, y: along[v] },
                    RankDir::LeftRight => Point { x: along[v], y: c },
                }
            })
            .collect()
    }
}

/// Sort `layer` by the mean position of each node's neighbours in the
/// adjacent rank; nodes without neighbours keep their slot as key.
fn reorder(layer: &mut Vec<usize>, neighbours: &[Vec<usize>], pos: &mut [usize]) {
    let mut keyed: Vec<(f64, usize, usize)> = layer
        .iter()
        .map(|&v| {
            let ns = &neighbours[v];
            let bary = if ns.is_empty() {
                pos[v] as f64
            } else {
                ns.iter().map(|&u| pos[u] as f64).sum::<f64>() / ns.len() as f64
            };
            (bary, pos[v], v)
        })
        .collect();
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    *layer = keyed.into_iter().map(|(_, _, v)| v).collect();
    for (i, &v) in layer.iter().enumerate() {
        pos[v] = i;
    }
}
