use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::RwLock;

use crate::validate;
use crate::{
    Catalog, InterfaceRecord, InterfaceUpdate, NewSystem, Result, StoreError, System, SystemId,
    SystemInterface, SystemUpdate,
};

/// Persistence collaborator for the system catalog.
///
/// The diagram engine only reads through this trait; mutations are issued
/// by the surrounding tooling. Child queries return rows ordered by
/// descending id.
#[async_trait]
pub trait GraphStore: Send + Sync {
    // ── Systems ──

    async fn get_system_by_id(&self, id: SystemId) -> Result<Option<System>>;
    async fn get_systems_by_parent_id(&self, id: SystemId) -> Result<Vec<System>> {
        self.get_systems_by_parent_ids(&[id]).await
    }
    /// Every system whose parent is any of `ids` (direct children only).
    async fn get_systems_by_parent_ids(&self, ids: &[SystemId]) -> Result<Vec<System>>;
    async fn get_all_systems(&self) -> Result<Vec<System>>;
    async fn get_top_level_systems(&self) -> Result<Vec<System>>;

    // ── Interfaces ──

    async fn get_all_interfaces(&self) -> Result<Vec<SystemInterface>>;
    async fn get_interface(
        &self,
        source_id: SystemId,
        target_id: SystemId,
    ) -> Result<Option<SystemInterface>>;
    /// Interfaces with either endpoint in `ids`, joined with both endpoint records.
    async fn get_all_interfaces_involving(&self, ids: &[SystemId]) -> Result<Vec<InterfaceRecord>>;

    // ── Mutations ──

    async fn create_system(&self, system: NewSystem) -> Result<System>;
    async fn update_system(&self, id: SystemId, update: SystemUpdate) -> Result<System>;
    /// Deletes a childless system and every interface touching it.
    async fn delete_system(&self, id: SystemId) -> Result<()>;
    async fn create_interface(&self, interface: SystemInterface) -> Result<SystemInterface>;
    async fn update_interface(
        &self,
        source_id: SystemId,
        target_id: SystemId,
        update: InterfaceUpdate,
    ) -> Result<SystemInterface>;
    async fn delete_interface(&self, source_id: SystemId, target_id: SystemId) -> Result<()>;
}

fn descending(mut systems: Vec<System>) -> Vec<System> {
    systems.sort_by(|a, b| b.id.cmp(&a.id));
    systems
}

// --- Catalog operations shared by the in-memory and file stores ---

impl Catalog {
    pub fn system(&self, id: SystemId) -> Option<&System> {
        self.systems.iter().find(|s| s.id == id)
    }

    pub fn children_of(&self, ids: &[SystemId]) -> Vec<System> {
        let parents: HashSet<SystemId> = ids.iter().copied().collect();
        descending(
            self.systems
                .iter()
                .filter(|s| s.parent_id.is_some_and(|p| parents.contains(&p)))
                .cloned()
                .collect(),
        )
    }

    pub fn top_level(&self) -> Vec<System> {
        descending(
            self.systems
                .iter()
                .filter(|s| s.parent_id.is_none())
                .cloned()
                .collect(),
        )
    }

    pub fn interface(&self, source_id: SystemId, target_id: SystemId) -> Option<&SystemInterface> {
        self.interfaces
            .iter()
            .find(|i| i.key() == (source_id, target_id))
    }

    pub fn interfaces_involving(&self, ids: &[SystemId]) -> Vec<InterfaceRecord> {
        let wanted: HashSet<SystemId> = ids.iter().copied().collect();
        self.interfaces
            .iter()
            .filter(|i| wanted.contains(&i.source_system_id) || wanted.contains(&i.target_system_id))
            .filter_map(|i| {
                let (Some(source), Some(target)) =
                    (self.system(i.source_system_id), self.system(i.target_system_id))
                else {
                    tracing::warn!(
                        source = i.source_system_id,
                        target = i.target_system_id,
                        "skipping interface with a dangling endpoint"
                    );
                    return None;
                };
                Some(InterfaceRecord {
                    interface: i.clone(),
                    source: source.clone(),
                    target: target.clone(),
                })
            })
            .collect()
    }

    pub fn insert_system(&mut self, new: NewSystem) -> Result<System> {
        validate::validate_new_system(&new)?;
        if let Some(parent) = new.parent_id {
            if self.system(parent).is_none() {
                return Err(StoreError::SystemNotFound(parent));
            }
        }
        let system = System {
            id: self.allocate_id(),
            name: new.name.trim().to_string(),
            category: new.category.trim().to_string(),
            parent_id: new.parent_id,
        };
        self.systems.push(system.clone());
        Ok(system)
    }

    pub fn apply_system_update(&mut self, id: SystemId, update: SystemUpdate) -> Result<System> {
        validate::validate_system_update(&update)?;
        let system = self
            .systems
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(StoreError::SystemNotFound(id))?;
        if let Some(name) = update.name {
            system.name = name.trim().to_string();
        }
        if let Some(category) = update.category {
            system.category = category.trim().to_string();
        }
        Ok(system.clone())
    }

    pub fn remove_system(&mut self, id: SystemId) -> Result<()> {
        if self.system(id).is_none() {
            return Err(StoreError::SystemNotFound(id));
        }
        let children = self.systems.iter().filter(|s| s.parent_id == Some(id)).count();
        if children > 0 {
            return Err(StoreError::Conflict(format!(
                "system {id} still has {children} child system(s)"
            )));
        }
        self.systems.retain(|s| s.id != id);
        self.interfaces.retain(|i| !i.involves(id));
        Ok(())
    }

    pub fn insert_interface(&mut self, interface: SystemInterface) -> Result<SystemInterface> {
        validate::validate_interface(&interface)?;
        for endpoint in [interface.source_system_id, interface.target_system_id] {
            if self.system(endpoint).is_none() {
                return Err(StoreError::SystemNotFound(endpoint));
            }
        }
        let (source, target) = interface.key();
        if self.interface(source, target).is_some() {
            return Err(StoreError::Conflict(format!(
                "interface {source} -> {target} already exists"
            )));
        }
        let interface = SystemInterface {
            connection_type: interface.connection_type.trim().to_string(),
            ..interface
        };
        self.interfaces.push(interface.clone());
        Ok(interface)
    }

    pub fn apply_interface_update(
        &mut self,
        source_id: SystemId,
        target_id: SystemId,
        update: InterfaceUpdate,
    ) -> Result<SystemInterface> {
        validate::validate_interface_update(&update)?;
        let interface = self
            .interfaces
            .iter_mut()
            .find(|i| i.key() == (source_id, target_id))
            .ok_or(StoreError::InterfaceNotFound {
                source_id,
                target_id,
            })?;
        if let Some(connection_type) = update.connection_type {
            interface.connection_type = connection_type.trim().to_string();
        }
        if let Some(directional) = update.directional {
            interface.directional = directional;
        }
        Ok(interface.clone())
    }

    pub fn remove_interface(&mut self, source_id: SystemId, target_id: SystemId) -> Result<()> {
        let before = self.interfaces.len();
        self.interfaces.retain(|i| i.key() != (source_id, target_id));
        if self.interfaces.len() == before {
            return Err(StoreError::InterfaceNotFound {
                source_id,
                target_id,
            });
        }
        Ok(())
    }
}

/// In-memory store, used by tests and embedders that own their data.
#[derive(Debug, Default)]
pub struct MemoryStore {
    catalog: RwLock<Catalog>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_catalog(catalog: Catalog) -> Self {
        Self {
            catalog: RwLock::new(catalog),
        }
    }

    pub async fn snapshot(&self) -> Catalog {
        self.catalog.read().await.clone()
    }
}

#[async_trait]
impl GraphStore for MemoryStore {
    async fn get_system_by_id(&self, id: SystemId) -> Result<Option<System>> {
        Ok(self.catalog.read().await.system(id).cloned())
    }

    async fn get_systems_by_parent_ids(&self, ids: &[SystemId]) -> Result<Vec<System>> {
        Ok(self.catalog.read().await.children_of(ids))
    }

    async fn get_all_systems(&self) -> Result<Vec<System>> {
        Ok(self.catalog.read().await.systems.clone())
    }

    async fn get_top_level_systems(&self) -> Result<Vec<System>> {
        Ok(self.catalog.read().await.top_level())
    }

    async fn get_all_interfaces(&self) -> Result<Vec<SystemInterface>> {
        Ok(self.catalog.read().await.interfaces.clone())
    }

    async fn get_interface(
        &self,
        source_id: SystemId,
        target_id: SystemId,
    ) -> Result<Option<SystemInterface>> {
        Ok(self
            .catalog
            .read()
            .await
            .interface(source_id, target_id)
            .cloned())
    }

    async fn get_all_interfaces_involving(&self, ids: &[SystemId]) -> Result<Vec<InterfaceRecord>> {
        Ok(self.catalog.read().await.interfaces_involving(ids))
    }

    async fn create_system(&self, system: NewSystem) -> Result<System> {
        self.catalog.write().await.insert_system(system)
    }

    async fn update_system(&self, id: SystemId, update: SystemUpdate) -> Result<System> {
        self.catalog.write().await.apply_system_update(id, update)
    }

    async fn delete_system(&self, id: SystemId) -> Result<()> {
        self.catalog.write().await.remove_system(id)
    }

    async fn create_interface(&self, interface: SystemInterface) -> Result<SystemInterface> {
        self.catalog.write().await.insert_interface(interface)
    }

    async fn update_interface(
        &self,
        source_id: SystemId,
        target_id: SystemId,
        update: InterfaceUpdate,
    ) -> Result<SystemInterface> {
        self.catalog
            .write()
            .await
            .apply_interface_update(source_id, target_id, update)
    }

    async fn delete_interface(&self, source_id: SystemId, target_id: SystemId) -> Result<()> {
        self.catalog
            .write()
            .await
            .remove_interface(source_id, target_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Directional;

    fn new_system(name: &str, parent_id: Option<SystemId>) -> NewSystem {
        NewSystem {
            name: name.to_string(),
            category: "Service".to_string(),
            parent_id,
        }
    }

    fn rest(source: SystemId, target: SystemId) -> SystemInterface {
        SystemInterface {
            source_system_id: source,
            target_system_id: target,
            connection_type: "REST".to_string(),
            directional: Directional::Directed,
        }
    }

    #[tokio::test]
    async fn children_come_back_newest_first() {
        let store = MemoryStore::new();
        let root = store.create_system(new_system("Platform", None)).await.unwrap();
        let a = store.create_system(new_system("Gateway", Some(root.id))).await.unwrap();
        let b = store.create_system(new_system("Billing", Some(root.id))).await.unwrap();

        let children = store.get_systems_by_parent_id(root.id).await.unwrap();
        let ids: Vec<SystemId> = children.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);
        assert_eq!(store.get_top_level_systems().await.unwrap(), vec![root]);
    }

    #[tokio::test]
    async fn create_system_requires_existing_parent() {
        let store = MemoryStore::new();
        let err = store.create_system(new_system("Orphan", Some(42))).await.unwrap_err();
        assert!(matches!(err, StoreError::SystemNotFound(42)));
    }

    #[tokio::test]
    async fn update_system_changes_name_and_category_only() {
        let store = MemoryStore::new();
        let root = store.create_system(new_system("Platform", None)).await.unwrap();
        let child = store.create_system(new_system("Gateway", Some(root.id))).await.unwrap();
        let updated = store
            .update_system(
                child.id,
                SystemUpdate {
                    name: Some("Edge Gateway".to_string()),
                    category: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Edge Gateway");
        assert_eq!(updated.category, "Service");
        assert_eq!(updated.parent_id, Some(root.id));
    }

    #[tokio::test]
    async fn delete_system_refuses_parents_and_cascades_interfaces() {
        let store = MemoryStore::new();
        let root = store.create_system(new_system("Platform", None)).await.unwrap();
        let child = store.create_system(new_system("Gateway", Some(root.id))).await.unwrap();
        let other = store.create_system(new_system("Payments", None)).await.unwrap();
        store.create_interface(rest(child.id, other.id)).await.unwrap();

        assert!(matches!(
            store.delete_system(root.id).await,
            Err(StoreError::Conflict(_))
        ));

        store.delete_system(child.id).await.unwrap();
        assert!(store.get_all_interfaces().await.unwrap().is_empty());
        store.delete_system(root.id).await.unwrap();
        assert_eq!(store.get_all_systems().await.unwrap(), vec![other]);
    }

    #[tokio::test]
    async fn interfaces_are_unique_per_ordered_pair() {
        let store = MemoryStore::new();
        let a = store.create_system(new_system("Frontend", None)).await.unwrap();
        let b = store.create_system(new_system("Backend", None)).await.unwrap();
        store.create_interface(rest(a.id, b.id)).await.unwrap();
        assert!(matches!(
            store.create_interface(rest(a.id, b.id)).await,
            Err(StoreError::Conflict(_))
        ));
        // The reverse direction is a different interface.
        store.create_interface(rest(b.id, a.id)).await.unwrap();
        assert!(matches!(
            store.create_interface(rest(a.id, 99)).await,
            Err(StoreError::SystemNotFound(99))
        ));
    }

    #[tokio::test]
    async fn interfaces_involving_are_denormalized() {
        let store = MemoryStore::new();
        let a = store.create_system(new_system("Frontend", None)).await.unwrap();
        let b = store.create_system(new_system("Backend", None)).await.unwrap();
        let c = store.create_system(new_system("Reporting", None)).await.unwrap();
        store.create_interface(rest(a.id, b.id)).await.unwrap();
        store.create_interface(rest(c.id, b.id)).await.unwrap();

        let records = store.get_all_interfaces_involving(&[a.id]).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source, a);
        assert_eq!(records[0].target, b);

        let records = store.get_all_interfaces_involving(&[b.id]).await.unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn update_and_delete_interface_by_pair() {
        let store = MemoryStore::new();
        let a = store.create_system(new_system("Frontend", None)).await.unwrap();
        let b = store.create_system(new_system("Backend", None)).await.unwrap();
        store.create_interface(rest(a.id, b.id)).await.unwrap();

        let updated = store
            .update_interface(
                a.id,
                b.id,
                InterfaceUpdate {
                    connection_type: Some("gRPC".to_string()),
                    directional: Some(Directional::Undirected),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.connection_type, "gRPC");
        assert_eq!(updated.directional, Directional::Undirected);

        assert!(matches!(
            store.delete_interface(b.id, a.id).await,
            Err(StoreError::InterfaceNotFound { .. })
        ));
        store.delete_interface(a.id, b.id).await.unwrap();
        assert!(store.get_interface(a.id, b.id).await.unwrap().is_none());
    }
}
