use std::collections::BTreeMap;

use sysmap_core::{GraphStore, System, SystemId};

/// Levels below the focal system a closure includes by default.
///
/// Deeper hierarchies are cut off on purpose: drilling into a child shows
/// the next two levels.
pub const DEFAULT_DEPTH: usize = 2;

/// Computes the set of systems shown for a focal system.
///
/// With a focal id the closure is the focal system plus `depth` levels of
/// descendants. Without one, the top-level systems stand in for the
/// children of a virtual root, so the default depth yields the top-level
/// systems and their direct children.
pub struct ClosureResolver<'a, S: ?Sized> {
    store: &'a S,
    depth: usize,
}

impl<'a, S: GraphStore + ?Sized> ClosureResolver<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            depth: DEFAULT_DEPTH,
        }
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    /// Resolve the closure, ordered by descending id.
    ///
    /// Any read failure yields an empty closure.
    pub async fn resolve(&self, focal: Option<SystemId>) -> Vec<System> {
        match self.expand(focal).await {
            Ok(systems) => {
                tracing::debug!(?focal, count = systems.len(), "resolved closure");
                systems
            }
            Err(e) => {
                tracing::warn!(?focal, error = %e, "closure resolution failed");
                Vec::new()
            }
        }
    }

    /// The focal system and its descendants down to the configured depth.
    pub async fn current_system_and_descendants(&self, id: SystemId) -> Vec<System> {
        self.resolve(Some(id)).await
    }

    async fn expand(&self, focal: Option<SystemId>) -> sysmap_core::Result<Vec<System>> {
        // Keyed by id; a later fetch of the same row replaces the earlier one.
        let mut merged: BTreeMap<SystemId, System> = BTreeMap::new();

        let (mut frontier, levels) = match focal {
            Some(id) => {
                match self.store.get_system_by_id(id).await? {
                    Some(system) => {
                        merged.insert(system.id, system);
                    }
                    None => tracing::debug!(id, "focal system not found"),
                }
                (vec![id], self.depth)
            }
            None => {
                let top = self.store.get_top_level_systems().await?;
                let ids = top.iter().map(|s| s.id).collect();
                merged.extend(top.into_iter().map(|s| (s.id, s)));
                (ids, self.depth.saturating_sub(1))
            }
        };

        for _ in 0..levels {
            if frontier.is_empty() {
                break;
            }
            let children = self.store.get_systems_by_parent_ids(&frontier).await?;
            frontier = children
                .iter()
                .map(|s| s.id)
                .filter(|id| !merged.contains_key(id))
                .collect();
            merged.extend(children.into_iter().map(|s| (s.id, s)));
        }

        Ok(merged.into_values().rev().collect())
    }
}
