use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::{
    Catalog, GraphStore, InterfaceRecord, InterfaceUpdate, NewSystem, Result, System, SystemId,
    SystemInterface, SystemUpdate,
};

/// Catalog persisted as a single JSON file.
///
/// Every read loads a fresh snapshot from disk, so edits made by other
/// processes are picked up on the next query. Mutations are serialized
/// through `write_lock` and land via temp file + rename, so a watcher sees
/// one complete write rather than a truncate followed by a write.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Store at the default location (`<data dir>/catalog.json`).
    pub fn open_default() -> Self {
        Self::open(crate::catalog_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<Catalog> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Catalog::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, catalog: &Catalog) -> Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        tokio::fs::create_dir_all(dir).await?;
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "catalog.json".to_string());
        let tmp = dir.join(format!(".{file_name}.tmp"));
        let json = serde_json::to_string_pretty(catalog)?;
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn mutate<T>(&self, op: impl FnOnce(&mut Catalog) -> Result<T>) -> Result<T> {
        let _guard = self.write_lock.lock().await;
        let mut catalog = self.load().await?;
        let out = op(&mut catalog)?;
        self.save(&catalog).await?;
        Ok(out)
    }
}

#[async_trait]
impl GraphStore for FileStore {
    async fn get_system_by_id(&self, id: SystemId) -> Result<Option<System>> {
        Ok(self.load().await?.system(id).cloned())
    }

    async fn get_systems_by_parent_ids(&self, ids: &[SystemId]) -> Result<Vec<System>> {
        Ok(self.load().await?.children_of(ids))
    }

    async fn get_all_systems(&self) -> Result<Vec<System>> {
        Ok(self.load().await?.systems)
    }

    async fn get_top_level_systems(&self) -> Result<Vec<System>> {
        Ok(self.load().await?.top_level())
    }

    async fn get_all_interfaces(&self) -> Result<Vec<SystemInterface>> {
        Ok(self.load().await?.interfaces)
    }

    async fn get_interface(
        &self,
        source_id: SystemId,
        target_id: SystemId,
    ) -> Result<Option<SystemInterface>> {
        Ok(self.load().await?.interface(source_id, target_id).cloned())
    }

    async fn get_all_interfaces_involving(&self, ids: &[SystemId]) -> Result<Vec<InterfaceRecord>> {
        Ok(self.load().await?.interfaces_involving(ids))
    }

    async fn create_system(&self, system: NewSystem) -> Result<System> {
        self.mutate(|c| c.insert_system(system)).await
    }

    async fn update_system(&self, id: SystemId, update: SystemUpdate) -> Result<System> {
        self.mutate(|c| c.apply_system_update(id, update)).await
    }

    async fn delete_system(&self, id: SystemId) -> Result<()> {
        self.mutate(|c| c.remove_system(id)).await
    }

    async fn create_interface(&self, interface: SystemInterface) -> Result<SystemInterface> {
        self.mutate(|c| c.insert_interface(interface)).await
    }

    async fn update_interface(
        &self,
        source_id: SystemId,
        target_id: SystemId,
        update: InterfaceUpdate,
    ) -> Result<SystemInterface> {
        self.mutate(|c| c.apply_interface_update(source_id, target_id, update))
            .await
    }

    async fn delete_interface(&self, source_id: SystemId, target_id: SystemId) -> Result<()> {
        self.mutate(|c| c.remove_interface(source_id, target_id))
            .await
    }
}
