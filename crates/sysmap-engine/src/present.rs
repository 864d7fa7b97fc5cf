use serde::Serialize;
use std::sync::{Arc, Mutex};

use sysmap_core::{DiagramSettings, Direction, Directional, SystemId, DEFAULT_PALETTE};

use crate::layered::{Point, RankDir};
use crate::layout::{Anchor, PositionedGraph};
use crate::{CanonicalGraph, EdgeKind, LayoutError};

/// Immutable color list shared by every presentation.
#[derive(Debug, Clone, PartialEq)]
pub struct Palette(Arc<[String]>);

impl Default for Palette {
    fn default() -> Self {
        Self(DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect())
    }
}

impl Palette {
    /// Palette from a color list; an empty list falls back to the default.
    pub fn new(colors: Vec<String>) -> Self {
        if colors.is_empty() {
            return Self::default();
        }
        Self(colors.into())
    }

    pub fn from_settings(settings: &DiagramSettings) -> Self {
        Self::new(settings.palette.clone())
    }

    pub fn color(&self, index: usize) -> &str {
        &self.0[index % self.0.len()]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderNode {
    pub id: String,
    pub system_id: SystemId,
    pub label: String,
    pub category: String,
    pub position: Point,
    pub source_anchor: Anchor,
    pub target_anchor: Anchor,
    pub color: String,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub label: String,
    pub animated: bool,
    /// Draw an arrow marker at the target.
    pub directed: bool,
    pub stroke: String,
    pub stroke_width: f64,
    pub containment: bool,
    /// True for edges drawn by a connect gesture and not stored anywhere.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub provisional: bool,
}

/// A fully positioned, styled diagram.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderGraph {
    pub direction: Direction,
    pub rank_dir: RankDir,
    pub nodes: Vec<RenderNode>,
    pub edges: Vec<RenderEdge>,
}

/// User intents raised by a rendered diagram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum DiagramEvent {
    FocalSystemChanged { id: Option<SystemId> },
    EdgeCreationRequested { source: SystemId, target: SystemId },
}

/// Caller-side handler for diagram events.
pub trait DiagramEvents: Send + Sync {
    /// Navigate to `id`, or to the top-level view for `None`.
    fn focal_system_changed(&self, id: Option<SystemId>);

    /// A connect gesture between two nodes. Nothing is persisted on the
    /// diagram side; the handler decides what to do with it.
    fn edge_creation_requested(&self, source: SystemId, target: SystemId);
}

/// Records events for later consumption.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<DiagramEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: DiagramEvent) {
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.push(event);
    }

    /// Take every recorded event, oldest first.
    pub fn drain(&self) -> Vec<DiagramEvent> {
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *events)
    }
}

impl DiagramEvents for EventLog {
    fn focal_system_changed(&self, id: Option<SystemId>) {
        self.push(DiagramEvent::FocalSystemChanged { id });
    }

    fn edge_creation_requested(&self, source: SystemId, target: SystemId) {
        self.push(DiagramEvent::EdgeCreationRequested { source, target });
    }
}

impl RenderGraph {
    pub fn node(&self, id: SystemId) -> Option<&RenderNode> {
        self.nodes.iter().find(|n| n.system_id == id)
    }

    /// Double-activation of a node: request it as the new focal system.
    ///
    /// Returns false without emitting anything if the node is not part of
    /// this graph.
    pub fn activate_node(&self, id: SystemId, events: &dyn DiagramEvents) -> bool {
        if self.node(id).is_none() {
            tracing::debug!(id, "activated node is not in the diagram");
            return false;
        }
        events.focal_system_changed(Some(id));
        true
    }

    /// Leave any drill-down and return to the top-level view.
    pub fn show_top_level(&self, events: &dyn DiagramEvents) {
        events.focal_system_changed(None);
    }

    /// Connect gesture between two nodes of this graph.
    ///
    /// Emits an edge-creation request and returns the edge to draw until
    /// the next refresh. The edge is not persisted.
    pub fn connect(
        &self,
        source: SystemId,
        target: SystemId,
        events: &dyn DiagramEvents,
    ) -> Option<RenderEdge> {
        if self.node(source).is_none() || self.node(target).is_none() {
            return None;
        }
        events.edge_creation_requested(source, target);
        Some(RenderEdge {
            id: format!("pending-{source}-{target}"),
            source: source.to_string(),
            target: target.to_string(),
            label: String::new(),
            animated: false,
            directed: true,
            stroke: String::new(),
            stroke_width: 1.0,
            containment: false,
            provisional: true,
        })
    }
}

/// Turns a canonical graph plus its layout into a [`RenderGraph`].
#[derive(Debug, Clone, PartialEq)]
pub struct Presenter {
    palette: Palette,
    edge_color_offset: usize,
}

impl Default for Presenter {
    fn default() -> Self {
        Self::from_settings(&DiagramSettings::default())
    }
}

impl Presenter {
    pub fn new(palette: Palette, edge_color_offset: usize) -> Self {
        Self {
            palette,
            edge_color_offset,
        }
    }

    pub fn from_settings(settings: &DiagramSettings) -> Self {
        Self::new(Palette::from_settings(settings), settings.edge_color_offset)
    }

    /// Style and position every node and edge.
    ///
    /// Node colors follow list position, not id: reordering the node list
    /// recolors the diagram.
    pub fn present(&self, graph: &CanonicalGraph, layout: &PositionedGraph) -> Result<RenderGraph, LayoutError> {
        let orientation = layout.orientation;
        let nodes = graph
            .nodes
            .iter()
            .enumerate()
            .map(|(i, system)| {
                let position = layout
                    .position(system.id)
                    .ok_or(LayoutError::UnknownEndpoint(system.id))?;
                Ok(RenderNode {
                    id: system.id.to_string(),
                    system_id: system.id,
                    label: system.name.clone(),
                    category: system.category.clone(),
                    position,
                    source_anchor: orientation.source_anchor(),
                    target_anchor: orientation.target_anchor(),
                    color: self.palette.color(i).to_string(),
                    width: layout.node_size.width,
                    height: layout.node_size.height,
                })
            })
            .collect::<Result<Vec<_>, LayoutError>>()?;

        let mut interface_index = 0;
        let mut containment_index = 0;
        let edges = graph
            .edges
            .iter()
            .map(|edge| {
                let (index, animated, directed, stroke_width) = match &edge.kind {
                    EdgeKind::Interface { directional, .. } => {
                        interface_index += 1;
                        (interface_index - 1, true, *directional == Directional::Directed, 2.0)
                    }
                    EdgeKind::Containment => {
                        containment_index += 1;
                        (containment_index - 1, false, true, 1.0)
                    }
                };
                RenderEdge {
                    id: edge.id.clone(),
                    source: edge.source.to_string(),
                    target: edge.target.to_string(),
                    label: edge.label().to_string(),
                    animated,
                    directed,
                    stroke: self.palette.color(index + self.edge_color_offset).to_string(),
                    stroke_width,
                    containment: edge.is_containment(),
                    provisional: false,
                }
            })
            .collect();

        Ok(RenderGraph {
            direction: orientation.direction(),
            rank_dir: orientation.rank_dir(),
            nodes,
            edges,
        })
    }
}
