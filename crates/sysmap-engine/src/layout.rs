use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use sysmap_core::{DiagramSettings, Direction, SystemId};

use crate::layered::{LayeredLayout, LayoutGraph, NodeOrigin, Point, RankDir, Size, Sugiyama};
use crate::{CanonicalGraph, LayoutError};

/// Side of a node box an edge attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Anchor {
    Top,
    Bottom,
    Left,
    Right,
}

/// Rank direction and connector anchors for one layout direction.
///
/// Only constructible from a [`Direction`], so the anchors always agree
/// with the rank direction handed to the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Orientation {
    direction: Direction,
    rank_dir: RankDir,
    source_anchor: Anchor,
    target_anchor: Anchor,
}

impl Orientation {
    pub fn new(direction: Direction) -> Self {
        match direction {
            Direction::Vertical => Self {
                direction,
                rank_dir: RankDir::TopBottom,
                source_anchor: Anchor::Bottom,
                target_anchor: Anchor::Top,
            },
            Direction::Horizontal => Self {
                direction,
                rank_dir: RankDir::LeftRight,
                source_anchor: Anchor::Right,
                target_anchor: Anchor::Left,
            },
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn rank_dir(&self) -> RankDir {
        self.rank_dir
    }

    /// Anchor outgoing edges leave from.
    pub fn source_anchor(&self) -> Anchor {
        self.source_anchor
    }

    /// Anchor incoming edges arrive at.
    pub fn target_anchor(&self) -> Anchor {
        self.target_anchor
    }
}

/// Layout result: the top-left corner of every node's box.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionedGraph {
    pub orientation: Orientation,
    pub node_size: Size,
    pub positions: BTreeMap<SystemId, Point>,
}

impl PositionedGraph {
    pub fn position(&self, id: SystemId) -> Option<Point> {
        self.positions.get(&id).copied()
    }
}

/// Sizes nodes uniformly and delegates to a [`LayeredLayout`].
///
/// Holds no state between calls; every call lays the graph out from
/// scratch.
#[derive(Clone)]
pub struct LayoutAdapter {
    engine: Arc<dyn LayeredLayout>,
    node_size: Size,
}

impl LayoutAdapter {
    pub fn new(engine: Arc<dyn LayeredLayout>, node_size: Size) -> Self {
        Self { engine, node_size }
    }

    pub fn from_settings(settings: &DiagramSettings) -> Self {
        let engine = Sugiyama {
            rank_sep: settings.rank_sep,
            node_sep: settings.node_sep,
            ..Sugiyama::default()
        };
        Self::new(
            Arc::new(engine),
            Size {
                width: settings.node_width,
                height: settings.node_height,
            },
        )
    }

    pub fn node_size(&self) -> Size {
        self.node_size
    }

    pub fn layout(&self, graph: &CanonicalGraph, direction: Direction) -> Result<PositionedGraph, LayoutError> {
        let orientation = Orientation::new(direction);
        let index: HashMap<SystemId, usize> = graph
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id, i))
            .collect();

        let mut edges = Vec::with_capacity(graph.edges.len());
        for edge in &graph.edges {
            let source = *index
                .get(&edge.source)
                .ok_or(LayoutError::UnknownEndpoint(edge.source))?;
            let target = *index
                .get(&edge.target)
                .ok_or(LayoutError::UnknownEndpoint(edge.target))?;
            edges.push((source, target));
        }

        let input = LayoutGraph {
            nodes: vec![self.node_size; graph.nodes.len()],
            edges,
            rank_dir: orientation.rank_dir(),
        };
        let raw = self.engine.layout(&input)?;
        if raw.len() != graph.nodes.len() {
            return Err(LayoutError::MalformedGeometry(format!(
                "expected {} positions, got {}",
                graph.nodes.len(),
                raw.len()
            )));
        }

        let (dx, dy) = match self.engine.origin() {
            NodeOrigin::Center => (self.node_size.width / 2.0, self.node_size.height / 2.0),
            NodeOrigin::TopLeft => (0.0, 0.0),
        };
        let mut positions = BTreeMap::new();
        for (node, point) in graph.nodes.iter().zip(raw) {
            if !point.x.is_finite() || !point.y.is_finite() {
                return Err(LayoutError::MalformedGeometry(format!(
                    "non-finite position for system {}",
                    node.id
                )));
            }
            positions.insert(
                node.id,
                Point {
                    x: point.x - dx,
                    y: point.y - dy,
                },
            );
        }

        tracing::debug!(
            nodes = positions.len(),
            edges = input.edges.len(),
            ?direction,
            "laid out diagram"
        );
        Ok(PositionedGraph {
            orientation,
            node_size: self.node_size,
            positions,
        })
    }
}
