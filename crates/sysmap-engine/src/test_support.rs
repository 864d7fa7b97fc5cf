use async_trait::async_trait;
use sysmap_core::{
    Catalog, Directional, GraphStore, InterfaceRecord, InterfaceUpdate, MemoryStore, NewSystem,
    StoreError, System, SystemId, SystemInterface, SystemUpdate,
};

pub fn system(id: SystemId, parent_id: Option<SystemId>) -> System {
    System {
        id,
        name: format!("System {id}"),
        category: "Service".to_string(),
        parent_id,
    }
}

pub fn directed(source: SystemId, target: SystemId, connection_type: &str) -> SystemInterface {
    SystemInterface {
        source_system_id: source,
        target_system_id: target,
        connection_type: connection_type.to_string(),
        directional: Directional::Directed,
    }
}

/// Store seeded with `(id, parent)` rows and the given interfaces.
pub fn seeded(rows: &[(SystemId, Option<SystemId>)], interfaces: Vec<SystemInterface>) -> MemoryStore {
    MemoryStore::from_catalog(Catalog {
        systems: rows.iter().map(|&(id, parent)| system(id, parent)).collect(),
        interfaces,
        next_id: 0,
    })
}

/// 1 ← 2 ← 3 ← 4: a chain four levels deep.
pub fn chain() -> MemoryStore {
    seeded(&[(1, None), (2, Some(1)), (3, Some(2)), (4, Some(3))], vec![])
}

/// Store whose every read fails.
pub struct BrokenStore;

fn broken<T>() -> sysmap_core::Result<T> {
    Err(StoreError::Io(std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        "store offline",
    )))
}

#[async_trait]
impl GraphStore for BrokenStore {
    async fn get_system_by_id(&self, _id: SystemId) -> sysmap_core::Result<Option<System>> {
        broken()
    }
    async fn get_systems_by_parent_ids(&self, _ids: &[SystemId]) -> sysmap_core::Result<Vec<System>> {
        broken()
    }
    async fn get_all_systems(&self) -> sysmap_core::Result<Vec<System>> {
        broken()
    }
    async fn get_top_level_systems(&self) -> sysmap_core::Result<Vec<System>> {
        broken()
    }
    async fn get_all_interfaces(&self) -> sysmap_core::Result<Vec<SystemInterface>> {
        broken()
    }
    async fn get_interface(
        &self,
        _source_id: SystemId,
        _target_id: SystemId,
    ) -> sysmap_core::Result<Option<SystemInterface>> {
        broken()
    }
    async fn get_all_interfaces_involving(
        &self,
        _ids: &[SystemId],
    ) -> sysmap_core::Result<Vec<InterfaceRecord>> {
        broken()
    }
    async fn create_system(&self, _system: NewSystem) -> sysmap_core::Result<System> {
        broken()
    }
    async fn update_system(&self, _id: SystemId, _update: SystemUpdate) -> sysmap_core::Result<System> {
        broken()
    }
    async fn delete_system(&self, _id: SystemId) -> sysmap_core::Result<()> {
        broken()
    }
    async fn create_interface(&self, _interface: SystemInterface) -> sysmap_core::Result<SystemInterface> {
        broken()
    }
    async fn update_interface(
        &self,
        _source_id: SystemId,
        _target_id: SystemId,
        _update: InterfaceUpdate,
    ) -> sysmap_core::Result<SystemInterface> {
        broken()
    }
    async fn delete_interface(&self, _source_id: SystemId, _target_id: SystemId) -> sysmap_core::Result<()> {
        broken()
    }
}

/// Memory store whose lookup of one system blocks until released.
pub struct GatedStore {
    inner: MemoryStore,
    gated: SystemId,
    gate: tokio::sync::Notify,
}

impl GatedStore {
    pub fn new(inner: MemoryStore, gated: SystemId) -> Self {
        Self {
            inner,
            gated,
            gate: tokio::sync::Notify::new(),
        }
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl GraphStore for GatedStore {
    async fn get_system_by_id(&self, id: SystemId) -> sysmap_core::Result<Option<System>> {
        if id == self.gated {
            self.gate.notified().await;
        }
        self.inner.get_system_by_id(id).await
    }
    async fn get_systems_by_parent_ids(&self, ids: &[SystemId]) -> sysmap_core::Result<Vec<System>> {
        self.inner.get_systems_by_parent_ids(ids).await
    }
    async fn get_all_systems(&self) -> sysmap_core::Result<Vec<System>> {
        self.inner.get_all_systems().await
    }
    async fn get_top_level_systems(&self) -> sysmap_core::Result<Vec<System>> {
        self.inner.get_top_level_systems().await
    }
    async fn get_all_interfaces(&self) -> sysmap_core::Result<Vec<SystemInterface>> {
        self.inner.get_all_interfaces().await
    }
    async fn get_interface(
        &self,
        source_id: SystemId,
        target_id: SystemId,
    ) -> sysmap_core::Result<Option<SystemInterface>> {
        self.inner.get_interface(source_id, target_id).await
    }
    async fn get_all_interfaces_involving(
        &self,
        ids: &[SystemId],
    ) -> sysmap_core::Result<Vec<InterfaceRecord>> {
        self.inner.get_all_interfaces_involving(ids).await
    }
    async fn create_system(&self, system: NewSystem) -> sysmap_core::Result<System> {
        self.inner.create_system(system).await
    }
    async fn update_system(&self, id: SystemId, update: SystemUpdate) -> sysmap_core::Result<System> {
        self.inner.update_system(id, update).await
    }
    async fn delete_system(&self, id: SystemId) -> sysmap_core::Result<()> {
        self.inner.delete_system(id).await
    }
    async fn create_interface(&self, interface: SystemInterface) -> sysmap_core::Result<SystemInterface> {
        self.inner.create_interface(interface).await
    }
    async fn update_interface(
        &self,
        source_id: SystemId,
        target_id: SystemId,
        update: InterfaceUpdate,
    ) -> sysmap_core::Result<SystemInterface> {
        self.inner.update_interface(source_id, target_id, update).await
    }
    async fn delete_interface(&self, source_id: SystemId, target_id: SystemId) -> sysmap_core::Result<()> {
        self.inner.delete_interface(source_id, target_id).await
    }
}
