//! Snapshot persistence
//!
//! The registry persists the whole committed graph after each successful
//! operation. Implementations can target the local filesystem or memory.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::StoreError;
use crate::graph::NodeGraph;

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Replace the stored snapshot.
    async fn save(&self, graph: &NodeGraph) -> Result<(), StoreError>;

    /// The stored snapshot, or `None` if nothing was saved yet.
    async fn load(&self) -> Result<Option<NodeGraph>, StoreError>;
}

/// JSON snapshot on the local filesystem.
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn save(&self, graph: &NodeGraph) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec(graph)?;
        // Readers never see a half-written snapshot.
        let temp = self.temp_path();
        tokio::fs::write(&temp, &bytes).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "snapshot saved");
        Ok(())
    }

    async fn load(&self) -> Result<Option<NodeGraph>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Keeps the last snapshot in memory.
#[derive(Clone, Default)]
pub struct MemorySnapshotStore {
    snapshot: Arc<RwLock<Option<String>>>,
    saves: Arc<std::sync::atomic::AtomicUsize>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(std::sync::atomic::Ordering::Relaxed)
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn save(&self, graph: &NodeGraph) -> Result<(), StoreError> {
        let json = serde_json::to_string(graph)?;
        *self.snapshot.write().await = Some(json);
        self.saves
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Ok(())
    }

    async fn load(&self) -> Result<Option<NodeGraph>, StoreError> {
        match self.snapshot.read().await.as_deref() {
            Some(json) => Ok(Some(serde_json::from_str(json)?)),
            None => Ok(None),
        }
    }
}
