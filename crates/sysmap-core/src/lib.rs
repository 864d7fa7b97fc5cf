pub mod error;
pub mod file_store;
pub mod store;
pub mod validate;
pub mod watch;

pub use error::{Result, StoreError};
pub use file_store::FileStore;
pub use store::{GraphStore, MemoryStore};
pub use watch::{watch_catalog, ChartVersion};

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

// --- Types ---

pub type SystemId = i64;

/// A component of the catalogued architecture. `parent_id` of `None` means top-level.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, schemars::JsonSchema)]
pub struct System {
    pub id: SystemId,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub parent_id: Option<SystemId>,
}

/// Whether an interface flows one way (source → target) or both ways.
///
/// Stored as the integers `1` and `2` to stay compatible with existing catalogs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "u8", into = "u8")]
pub enum Directional {
    Directed,
    Undirected,
}

impl TryFrom<u8> for Directional {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Directional::Directed),
            2 => Ok(Directional::Undirected),
            other => Err(format!("directional must be 1 or 2, got {other}")),
        }
    }
}

impl From<Directional> for u8 {
    fn from(value: Directional) -> Self {
        match value {
            Directional::Directed => 1,
            Directional::Undirected => 2,
        }
    }
}

/// A connection between any two systems, identified by the ordered pair
/// `(source_system_id, target_system_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SystemInterface {
    pub source_system_id: SystemId,
    pub target_system_id: SystemId,
    pub connection_type: String,
    pub directional: Directional,
}

impl SystemInterface {
    pub fn key(&self) -> (SystemId, SystemId) {
        (self.source_system_id, self.target_system_id)
    }

    pub fn involves(&self, id: SystemId) -> bool {
        self.source_system_id == id || self.target_system_id == id
    }
}

/// An interface joined with the full records of both endpoints.
///
/// Endpoints frequently lie outside the node set a query started from, so
/// readers fold `source` and `target` back into their node collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InterfaceRecord {
    #[serde(flatten)]
    pub interface: SystemInterface,
    pub source: System,
    pub target: System,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, schemars::JsonSchema)]
pub struct NewSystem {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub parent_id: Option<SystemId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, schemars::JsonSchema)]
pub struct SystemUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InterfaceUpdate {
    #[serde(default)]
    pub connection_type: Option<String>,
    #[serde(default)]
    pub directional: Option<Directional>,
}

/// Everything the file store persists.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Catalog {
    #[serde(default)]
    pub systems: Vec<System>,
    #[serde(default)]
    pub interfaces: Vec<SystemInterface>,
    #[serde(default)]
    pub next_id: SystemId,
}

impl Catalog {
    /// Next free id: the stored counter, or one past the largest id in use.
    pub fn allocate_id(&mut self) -> SystemId {
        let max = self.systems.iter().map(|s| s.id).max().unwrap_or(0);
        let id = self.next_id.max(max + 1);
        self.next_id = id + 1;
        id
    }
}

/// Layout flow of the diagram.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Ranks flow top to bottom.
    #[default]
    Vertical,
    /// Ranks flow left to right.
    Horizontal,
}

// --- Storage ---

/// Resolve the data directory: `$SYSMAP_HOME`, else `~/.sysmap/`.
pub fn data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("SYSMAP_HOME") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".sysmap")
}

pub fn catalog_path() -> PathBuf {
    data_dir().join("catalog.json")
}

// --- Diagram settings ---

pub const DEFAULT_PALETTE: [&str; 8] = [
    "#3ECF8E", "#0070f3", "#f97316", "#9333ea", "#10b981", "#0ea5e9", "#facc15", "#ef4444",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct DiagramSettings {
    pub palette: Vec<String>,
    /// Interface edges take `palette[(index + offset) % len]` so they don't
    /// share colors with the first nodes.
    pub edge_color_offset: usize,
    pub node_width: f64,
    pub node_height: f64,
    pub rank_sep: f64,
    pub node_sep: f64,
    /// Hierarchy levels below the focal system included in a closure.
    pub closure_depth: usize,
    pub direction: Direction,
}

impl Default for DiagramSettings {
    fn default() -> Self {
        Self {
            palette: DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect(),
            edge_color_offset: 5,
            node_width: 180.0,
            node_height: 60.0,
            rank_sep: 50.0,
            node_sep: 50.0,
            closure_depth: 2,
            direction: Direction::Vertical,
        }
    }
}

fn settings_path() -> PathBuf {
    data_dir().join("settings.json")
}

pub fn read_settings() -> DiagramSettings {
    read_settings_from(&settings_path())
}

/// Read settings from `path`, falling back to defaults when the file is
/// missing or unreadable.
pub fn read_settings_from(path: &Path) -> DiagramSettings {
    if !path.exists() {
        return DiagramSettings::default();
    }
    let mut settings: DiagramSettings = match fs::read_to_string(path)
        .map_err(StoreError::from)
        .and_then(|s| serde_json::from_str(&s).map_err(StoreError::from))
    {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable settings");
            return DiagramSettings::default();
        }
    };
    if settings.palette.is_empty() {
        settings.palette = DiagramSettings::default().palette;
    }
    settings
}

pub fn write_settings(settings: &DiagramSettings) -> Result<()> {
    write_settings_to(&settings_path(), settings)
}

pub fn write_settings_to(path: &Path, settings: &DiagramSettings) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directional_uses_integer_codes() {
        let iface = SystemInterface {
            source_system_id: 1,
            target_system_id: 4,
            connection_type: "REST".to_string(),
            directional: Directional::Undirected,
        };
        let json = serde_json::to_value(&iface).unwrap();
        assert_eq!(json["directional"], 2);

        let bad = serde_json::json!({
            "source_system_id": 1,
            "target_system_id": 4,
            "connection_type": "REST",
            "directional": 3,
        });
        assert!(serde_json::from_value::<SystemInterface>(bad).is_err());
    }

    #[test]
    fn interface_record_reads_denormalized_rows() {
        let row = serde_json::json!({
            "source_system_id": 1,
            "target_system_id": 4,
            "connection_type": "gRPC",
            "directional": 1,
            "source": { "id": 1, "name": "Billing", "category": "Service", "parent_id": null },
            "target": { "id": 4, "name": "Ledger", "category": "Database", "parent_id": 3 },
        });
        let record: InterfaceRecord = serde_json::from_value(row).unwrap();
        assert_eq!(record.interface.key(), (1, 4));
        assert_eq!(record.target.parent_id, Some(3));
    }

    #[test]
    fn allocate_id_skips_ids_in_use() {
        let mut catalog = Catalog {
            systems: vec![System {
                id: 7,
                name: "Gateway".to_string(),
                category: "Service".to_string(),
                parent_id: None,
            }],
            ..Default::default()
        };
        assert_eq!(catalog.allocate_id(), 8);
        assert_eq!(catalog.allocate_id(), 9);
    }

    #[test]
    fn settings_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        assert_eq!(read_settings_from(&path), DiagramSettings::default());

        fs::write(&path, "{ not json").unwrap();
        assert_eq!(read_settings_from(&path), DiagramSettings::default());

        fs::write(&path, r#"{"palette": [], "closureDepth": 3}"#).unwrap();
        let settings = read_settings_from(&path);
        assert_eq!(settings.closure_depth, 3);
        assert_eq!(settings.palette.len(), DEFAULT_PALETTE.len());
    }

    #[test]
    fn settings_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = DiagramSettings {
            direction: Direction::Horizontal,
            node_width: 200.0,
            ..Default::default()
        };
        write_settings_to(&path, &settings).unwrap();
        assert_eq!(read_settings_from(&path), settings);
    }
}
