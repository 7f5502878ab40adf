//! Where the live graph comes from.
//!
//! The sweep only ever asks for a snapshot; it never reads process-wide
//! state, so any container that can hand out a [`LiveGraph`] can drive it.

use crate::models::graph::LiveGraph;
use async_trait::async_trait;
use std::{io, path::PathBuf};
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt, sync::RwLock};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("live graph has not been loaded yet")]
    NotHydrated,
    #[error("state file `{path}` unavailable: {source}")]
    StateFile { path: PathBuf, source: io::Error },
    #[error("state file `{path}` is malformed: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
}

pub type GraphResult<T> = Result<T, GraphError>;

#[async_trait]
pub trait GraphSource: Send + Sync {
    /// A point-in-time copy of the live graph.
    async fn snapshot(&self) -> GraphResult<LiveGraph>;

    /// Replace the live graph wholesale.
    async fn replace(&self, graph: LiveGraph) -> GraphResult<()>;
}

/// Graph held in memory, fed by the host application.
///
/// Until the first [`GraphSource::replace`] a default-constructed graph is
/// unhydrated and refuses snapshots, so a sweep cannot run against state
/// that was never loaded.
#[derive(Debug, Default)]
pub struct InMemoryGraph {
    graph: RwLock<Option<LiveGraph>>,
}

impl InMemoryGraph {
    pub fn new(graph: LiveGraph) -> Self {
        Self {
            graph: RwLock::new(Some(graph)),
        }
    }
}

#[async_trait]
impl GraphSource for InMemoryGraph {
    async fn snapshot(&self) -> GraphResult<LiveGraph> {
        self.graph.read().await.clone().ok_or(GraphError::NotHydrated)
    }

    async fn replace(&self, graph: LiveGraph) -> GraphResult<()> {
        *self.graph.write().await = Some(graph);
        Ok(())
    }
}

/// Graph persisted as a JSON file, re-read on every snapshot.
///
/// A missing file is an error, not an empty graph: an empty graph would make
/// every stored blob look orphaned.
#[derive(Debug, Clone)]
pub struct JsonFileGraph {
    path: PathBuf,
}

impl JsonFileGraph {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn io_err(&self, source: io::Error) -> GraphError {
        GraphError::StateFile {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl GraphSource for JsonFileGraph {
    async fn snapshot(&self) -> GraphResult<LiveGraph> {
        let raw = fs::read(&self.path).await.map_err(|e| self.io_err(e))?;
        serde_json::from_slice(&raw).map_err(|source| GraphError::Malformed {
            path: self.path.clone(),
            source,
        })
    }

    async fn replace(&self, graph: LiveGraph) -> GraphResult<()> {
        let body = serde_json::to_vec_pretty(&graph).map_err(|source| GraphError::Malformed {
            path: self.path.clone(),
            source,
        })?;

        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).await.map_err(|e| self.io_err(e))?;

        let tmp_path = parent.join(format!(".state-{}", Uuid::new_v4()));
        let write = async {
            let mut file = fs::File::create(&tmp_path).await?;
            file.write_all(&body).await?;
            file.sync_all().await?;
            fs::rename(&tmp_path, &self.path).await
        };
        if let Err(err) = write.await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(self.io_err(err));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{blob::BlobKey, graph::Settings};
    use tempfile::TempDir;

    fn sample() -> LiveGraph {
        LiveGraph {
            sessions: vec![],
            settings: Settings {
                user_avatar_key: Some(BlobKey::new("picture:9")),
                default_assistant_avatar_key: None,
            },
        }
    }

    #[tokio::test]
    async fn in_memory_snapshot_is_a_copy() {
        let source = InMemoryGraph::new(sample());
        let snap = source.snapshot().await.unwrap();
        source.replace(LiveGraph::default()).await.unwrap();

        assert_eq!(snap, sample());
        assert_eq!(source.snapshot().await.unwrap(), LiveGraph::default());
    }

    #[tokio::test]
    async fn unhydrated_graph_refuses_snapshots() {
        let source = InMemoryGraph::default();
        assert!(matches!(
            source.snapshot().await,
            Err(GraphError::NotHydrated)
        ));

        source.replace(sample()).await.unwrap();
        assert_eq!(source.snapshot().await.unwrap(), sample());
    }

    #[tokio::test]
    async fn json_file_round_trips_through_replace() {
        let dir = TempDir::new().unwrap();
        let source = JsonFileGraph::new(dir.path().join("state").join("graph.json"));

        source.replace(sample()).await.unwrap();
        assert_eq!(source.snapshot().await.unwrap(), sample());
    }

    #[tokio::test]
    async fn missing_state_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let source = JsonFileGraph::new(dir.path().join("absent.json"));

        assert!(matches!(
            source.snapshot().await,
            Err(GraphError::StateFile { .. })
        ));
    }

    #[tokio::test]
    async fn malformed_state_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("graph.json");
        std::fs::write(&path, b"{\"sessions\": 3}").unwrap();

        assert!(matches!(
            JsonFileGraph::new(path).snapshot().await,
            Err(GraphError::Malformed { .. })
        ));
    }
}
