use notify::{recommended_watcher, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::Result;

/// Monotonic refresh counter. Bumped after every mutation so the next
/// diagram request recomputes instead of reusing the last layout.
#[derive(Debug, Clone, Default)]
pub struct ChartVersion(Arc<AtomicU64>);

impl ChartVersion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    /// Increment and return the new version.
    pub fn bump(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Watch the catalog file and bump `version` whenever it is created,
/// modified or removed by anyone.
///
/// The parent directory is watched rather than the file itself because
/// atomic writes replace the file through a rename. The returned watcher
/// must be kept alive for as long as events are wanted.
pub fn watch_catalog(path: &Path, version: ChartVersion) -> Result<RecommendedWatcher> {
    let dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
    std::fs::create_dir_all(&dir)?;
    let Some(file_name) = path.file_name().map(|n| n.to_os_string()) else {
        return Err(crate::StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} has no file name", path.display()),
        )));
    };

    let mut watcher = recommended_watcher(move |res: notify::Result<notify::Event>| {
        let event = match res {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "catalog watch error");
                return;
            }
        };
        if !matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        ) {
            return;
        }
        if event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name.as_os_str()))
        {
            let v = version.bump();
            tracing::debug!(chart_version = v, "catalog changed on disk");
        }
    })?;

    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn bump_is_monotonic_and_shared() {
        let version = ChartVersion::new();
        let clone = version.clone();
        assert_eq!(version.get(), 0);
        assert_eq!(clone.bump(), 1);
        assert_eq!(version.bump(), 2);
        assert_eq!(clone.get(), 2);
    }

    #[tokio::test]
    async fn external_write_bumps_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let version = ChartVersion::new();
        let _watcher = watch_catalog(&path, version.clone()).unwrap();

        std::fs::write(dir.path().join("unrelated.txt"), "x").unwrap();
        std::fs::write(&path, "{}").unwrap();

        for _ in 0..50 {
            if version.get() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(version.get() > 0);
    }
}
