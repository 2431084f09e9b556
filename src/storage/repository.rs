use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{GraphError, Result};
use crate::storage::context::GraphSnapshot;

/// On-disk format version written by `JsonFileStore`
pub const FORMAT_VERSION: u32 = 1;

/// Durable store for named graphs
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Load the last persisted snapshot of `name`, if any
    async fn load(&self, name: &str) -> Result<Option<GraphSnapshot>>;

    /// Replace the persisted snapshot of `name`
    async fn persist(&self, name: &str, snapshot: &GraphSnapshot) -> Result<()>;

    /// Forget `name`. Returns false if nothing was stored.
    async fn remove(&self, name: &str) -> Result<bool>;

    /// Short backend label for logs
    fn backend(&self) -> &'static str;
}

/// Process-local store
#[derive(Default)]
pub struct MemoryStore {
    graphs: Mutex<HashMap<String, GraphSnapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.graphs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.graphs.lock().is_empty()
    }
}

#[async_trait]
impl GraphStore for MemoryStore {
    async fn load(&self, name: &str) -> Result<Option<GraphSnapshot>> {
        Ok(self.graphs.lock().get(name).cloned())
    }

    async fn persist(&self, name: &str, snapshot: &GraphSnapshot) -> Result<()> {
        self.graphs.lock().insert(name.to_string(), snapshot.clone());
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<bool> {
        Ok(self.graphs.lock().remove(name).is_some())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Document written for each graph
#[derive(Debug, Serialize, Deserialize)]
struct StoredGraph {
    version: u32,
    name: String,
    saved_at: DateTime<Utc>,
    snapshot: GraphSnapshot,
}

/// One JSON document per graph under a data directory
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    data_dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of the document for `name`
    pub fn path_for(&self, name: &str) -> Result<PathBuf> {
        validate_graph_name(name)?;
        Ok(self.data_dir.join(format!("{}.json", name)))
    }
}

#[async_trait]
impl GraphStore for JsonFileStore {
    async fn load(&self, name: &str) -> Result<Option<GraphSnapshot>> {
        let path = self.path_for(name)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let stored: StoredGraph = serde_json::from_slice(&bytes).map_err(|e| {
            GraphError::Storage(format!("corrupt graph file {}: {}", path.display(), e))
        })?;
        if stored.version != FORMAT_VERSION {
            return Err(GraphError::Storage(format!(
                "graph file {} has format version {}, expected {}",
                path.display(),
                stored.version,
                FORMAT_VERSION
            )));
        }

        tracing::debug!(
            "Loaded graph {} from {} ({} entities, {} actions)",
            name,
            path.display(),
            stored.snapshot.entities.len(),
            stored.snapshot.actions.len()
        );
        Ok(Some(stored.snapshot))
    }

    async fn persist(&self, name: &str, snapshot: &GraphSnapshot) -> Result<()> {
        let path = self.path_for(name)?;
        tokio::fs::create_dir_all(&self.data_dir).await?;

        let stored = StoredGraph {
            version: FORMAT_VERSION,
            name: name.to_string(),
            saved_at: Utc::now(),
            snapshot: snapshot.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&stored)?;

        // Write beside the target and rename so readers never see a partial file
        let tmp = self
            .data_dir
            .join(format!(".{}.{}.json.tmp", name, Uuid::new_v4().simple()));
        let written = match tokio::fs::write(&tmp, &bytes).await {
            Ok(()) => tokio::fs::rename(&tmp, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        tracing::debug!("Persisted graph {} to {} ({} bytes)", name, path.display(), bytes.len());
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<bool> {
        let path = self.path_for(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn backend(&self) -> &'static str {
        "json"
    }
}

/// Graph names become file names, so keep them to a safe alphabet
pub fn validate_graph_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(GraphError::Validation("graph name must not be empty".into()));
    }
    if name.starts_with('.')
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(GraphError::Validation(format!(
            "graph name '{}' may only contain ASCII letters, digits, '-', '_' and '.'",
            name
        )));
    }
    Ok(())
}
