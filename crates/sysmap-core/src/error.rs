//! Error types for catalog stores

use thiserror::Error;

use crate::SystemId;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("system {0} not found")]
    SystemNotFound(SystemId),

    #[error("interface {source_id} -> {target_id} not found")]
    InterfaceNotFound {
        source_id: SystemId,
        target_id: SystemId,
    },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),
}
