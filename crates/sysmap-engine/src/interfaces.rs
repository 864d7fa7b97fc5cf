use sysmap_core::{GraphStore, InterfaceRecord, System, SystemId};

/// Finds the interfaces touching a node set.
///
/// The returned records carry both endpoint systems. Endpoints outside the
/// supplied node set must be folded back into the node collection before
/// rendering; [`crate::CanonicalGraph::from_resolution`] does that.
pub struct InterfaceResolver<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: GraphStore + ?Sized> InterfaceResolver<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Every interface with a source or target in `nodes`. Read failures
    /// yield no interfaces.
    pub async fn resolve(&self, nodes: &[System]) -> Vec<InterfaceRecord> {
        if nodes.is_empty() {
            return Vec::new();
        }
        let ids: Vec<SystemId> = nodes.iter().map(|s| s.id).collect();
        match self.store.get_all_interfaces_involving(&ids).await {
            Ok(records) => {
                tracing::debug!(nodes = ids.len(), interfaces = records.len(), "resolved interfaces");
                records
            }
            Err(e) => {
                tracing::warn!(error = %e, "interface resolution failed");
                Vec::new()
            }
        }
    }
}

/// Endpoints referenced by `records` that are not already in `nodes`.
pub fn off_closure_endpoints(nodes: &[System], records: &[InterfaceRecord]) -> Vec<System> {
    let mut missing: Vec<System> = Vec::new();
    for endpoint in records.iter().flat_map(|r| [&r.source, &r.target]) {
        let known = nodes.iter().chain(missing.iter()).any(|s| s.id == endpoint.id);
        if !known {
            missing.push(endpoint.clone());
        }
    }
    missing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{directed, seeded, system, BrokenStore};

    #[tokio::test]
    async fn finds_interfaces_from_either_endpoint() {
        let store = seeded(
            &[(1, None), (2, Some(1)), (7, None), (8, None)],
            vec![directed(2, 7, "REST"), directed(8, 1, "gRPC"), directed(7, 8, "AMQP")],
        );
        let nodes = vec![system(1, None), system(2, Some(1))];
        let records = InterfaceResolver::new(&store).resolve(&nodes).await;

        let keys: Vec<(SystemId, SystemId)> = records.iter().map(|r| r.interface.key()).collect();
        assert_eq!(keys, vec![(2, 7), (8, 1)]);

        let extra: Vec<SystemId> = off_closure_endpoints(&nodes, &records)
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(extra, vec![7, 8]);
    }

    #[tokio::test]
    async fn empty_node_set_needs_no_query() {
        let records = InterfaceResolver::new(&BrokenStore).resolve(&[]).await;
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn read_failure_yields_no_interfaces() {
        let records = InterfaceResolver::new(&BrokenStore)
            .resolve(&[system(1, None)])
            .await;
        assert!(records.is_empty());
    }
}
