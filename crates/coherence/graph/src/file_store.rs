use crate::error::StorageError;
use crate::graph::AgentGraph;
use crate::storage::GraphStore;
use crate::types::{AgentId, ElementId};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// One JSON document per agent under a directory.
///
/// Saves write a temporary file and rename it over the previous document, so
/// readers see either the old graph or the new one, never a partial write.
pub struct JsonFileGraphStore {
    dir: PathBuf,
    tmp_seq: AtomicU64,
}

impl JsonFileGraphStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            tmp_seq: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the document for an agent. Agent ids are hashed so any string
    /// maps to a safe file name.
    pub fn path_for(&self, agent_id: &AgentId) -> PathBuf {
        let name = ElementId::hash(agent_id.as_str().as_bytes()).to_hex();
        self.dir.join(format!("{}.json", name))
    }
}

#[async_trait]
impl GraphStore for JsonFileGraphStore {
    async fn load(&self, agent_id: &AgentId) -> Result<Option<AgentGraph>, StorageError> {
        let path = self.path_for(agent_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let graph: AgentGraph = serde_json::from_slice(&bytes)?;
        tracing::debug!(
            agent_id = %agent_id,
            version = graph.version(),
            path = %path.display(),
            "Loaded graph document"
        );
        Ok(Some(graph))
    }

    async fn save(&self, agent_id: &AgentId, graph: &AgentGraph) -> Result<(), StorageError> {
        let path = self.path_for(agent_id);
        let seq = self.tmp_seq.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("json.tmp{}", seq));
        let bytes = serde_json::to_vec_pretty(graph)?;

        tokio::fs::write(&tmp, &bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        tracing::debug!(
            agent_id = %agent_id,
            version = graph.version(),
            bytes = bytes.len(),
            "Saved graph document"
        );
        Ok(())
    }
}
