use serde::Serialize;
use std::collections::HashMap;

use sysmap_core::{Directional, InterfaceRecord, System, SystemId, SystemInterface};

/// Label carried by synthesized parent → child edges.
pub const CONTAINMENT_LABEL: &str = "child";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EdgeKind {
    /// A persisted interface.
    #[serde(rename_all = "camelCase")]
    Interface {
        connection_type: String,
        directional: Directional,
    },
    /// Synthesized from a node's `parent_id`.
    Containment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub id: String,
    pub source: SystemId,
    pub target: SystemId,
    #[serde(flatten)]
    pub kind: EdgeKind,
}

impl GraphEdge {
    pub fn label(&self) -> &str {
        match &self.kind {
            EdgeKind::Interface {
                connection_type, ..
            } => connection_type,
            EdgeKind::Containment => CONTAINMENT_LABEL,
        }
    }

    pub fn is_containment(&self) -> bool {
        matches!(self.kind, EdgeKind::Containment)
    }
}

pub fn interface_edge_id(source: SystemId, target: SystemId) -> String {
    format!("iface-{source}-{target}")
}

pub fn containment_edge_id(parent: SystemId, child: SystemId) -> String {
    format!("child-{parent}-{child}")
}

/// Deduplicated, endpoint-complete node and edge set ready for layout.
///
/// Rebuilt from scratch for every diagram request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CanonicalGraph {
    pub nodes: Vec<System>,
    pub edges: Vec<GraphEdge>,
}

impl CanonicalGraph {
    /// Merge partial node and edge lists.
    ///
    /// Nodes are unique by id; a later entry overwrites the attributes of an
    /// earlier one but keeps its position. Interfaces are unique by ordered
    /// pair, later wins. Interfaces with an endpoint missing from the merged
    /// node set are dropped. One containment edge is added per node whose
    /// parent is also present.
    pub fn merge<N, E>(node_lists: N, edge_lists: E) -> Self
    where
        N: IntoIterator<Item = Vec<System>>,
        E: IntoIterator<Item = Vec<SystemInterface>>,
    {
        let mut nodes: Vec<System> = Vec::new();
        let mut node_index: HashMap<SystemId, usize> = HashMap::new();
        for system in node_lists.into_iter().flatten() {
            match node_index.get(&system.id) {
                Some(&i) => nodes[i] = system,
                None => {
                    node_index.insert(system.id, nodes.len());
                    nodes.push(system);
                }
            }
        }

        let mut interfaces: Vec<SystemInterface> = Vec::new();
        let mut pair_index: HashMap<(SystemId, SystemId), usize> = HashMap::new();
        for interface in edge_lists.into_iter().flatten() {
            let key = interface.key();
            if !node_index.contains_key(&key.0) || !node_index.contains_key(&key.1) {
                tracing::warn!(
                    source = key.0,
                    target = key.1,
                    "dropping interface with an endpoint outside the graph"
                );
                continue;
            }
            match pair_index.get(&key) {
                Some(&i) => interfaces[i] = interface,
                None => {
                    pair_index.insert(key, interfaces.len());
                    interfaces.push(interface);
                }
            }
        }

        let mut edges: Vec<GraphEdge> = interfaces
            .into_iter()
            .map(|i| GraphEdge {
                id: interface_edge_id(i.source_system_id, i.target_system_id),
                source: i.source_system_id,
                target: i.target_system_id,
                kind: EdgeKind::Interface {
                    connection_type: i.connection_type,
                    directional: i.directional,
                },
            })
            .collect();

        edges.extend(nodes.iter().filter_map(|child| {
            let parent = child.parent_id?;
            if parent == child.id || !node_index.contains_key(&parent) {
                return None;
            }
            Some(GraphEdge {
                id: containment_edge_id(parent, child.id),
                source: parent,
                target: child.id,
                kind: EdgeKind::Containment,
            })
        }));

        Self { nodes, edges }
    }

    /// Canonical graph for a closure and the interfaces resolved against it,
    /// folding off-closure endpoints into the node set.
    pub fn from_resolution(closure: Vec<System>, records: Vec<InterfaceRecord>) -> Self {
        let endpoints = crate::interfaces::off_closure_endpoints(&closure, &records);
        let interfaces = records.into_iter().map(|r| r.interface).collect();
        Self::merge([closure, endpoints], [interfaces])
    }

    pub fn node(&self, id: SystemId) -> Option<&System> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn contains(&self, id: SystemId) -> bool {
        self.node(id).is_some()
    }

    pub fn interface_edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter().filter(|e| !e.is_containment())
    }

    pub fn containment_edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter().filter(|e| e.is_containment())
    }
}
