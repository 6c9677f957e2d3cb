//! Experiment status snapshot and its stores.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::error::StatusError;

/// Whether an experiment is currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentStatus {
    Active,
    /// Also the landing value for anything unrecognized.
    #[default]
    #[serde(other)]
    Inactive,
}

impl ExperimentStatus {
    /// Normalize arbitrary JSON input; only the exact string `"active"` is active.
    pub fn normalize(value: Option<&Value>) -> Self {
        match value.and_then(Value::as_str) {
            Some("active") => ExperimentStatus::Active,
            _ => ExperimentStatus::Inactive,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExperimentStatus::Active => "active",
            ExperimentStatus::Inactive => "inactive",
        }
    }
}

/// Latest known status, mirrored onto the bus.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusSnapshot {
    #[serde(default)]
    pub status: ExperimentStatus,
    #[serde(default)]
    pub message: String,
}

impl StatusSnapshot {
    pub fn new(status: ExperimentStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// Loosely-typed update as posted by dashboard clients.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusUpdate {
    #[serde(default)]
    pub status: Option<Value>,
    #[serde(default)]
    pub message: Option<Value>,
}

impl StatusUpdate {
    /// Apply the normalization rules: unknown status becomes inactive, a
    /// missing or empty message becomes `""`.
    pub fn normalize(&self) -> StatusSnapshot {
        let message = match &self.message {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        StatusSnapshot {
            status: ExperimentStatus::normalize(self.status.as_ref()),
            message,
        }
    }
}

/// Source of the current status snapshot.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Current snapshot, or `None` when nothing has been set yet.
    async fn snapshot(&self) -> Result<Option<StatusSnapshot>, StatusError>;

    /// Replace the current snapshot.
    async fn update(&self, snapshot: StatusSnapshot) -> Result<(), StatusError>;
}

/// Status kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryStatusStore {
    current: RwLock<Option<StatusSnapshot>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: StatusSnapshot) -> Self {
        Self {
            current: RwLock::new(Some(snapshot)),
        }
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn snapshot(&self) -> Result<Option<StatusSnapshot>, StatusError> {
        Ok(self.current.read().await.clone())
    }

    async fn update(&self, snapshot: StatusSnapshot) -> Result<(), StatusError> {
        *self.current.write().await = Some(snapshot);
        Ok(())
    }
}

/// Status persisted as a small JSON file, so it survives restarts and can be
/// inspected or edited by hand.
///
/// Clones share one write lock, so updates through any of them land one at a
/// time.
#[derive(Debug, Clone)]
pub struct FileStatusStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FileStatusStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StatusStore for FileStatusStore {
    async fn snapshot(&self) -> Result<Option<StatusSnapshot>, StatusError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&self, snapshot: StatusSnapshot) -> Result<(), StatusError> {
        let bytes = serde_json::to_vec(&snapshot)?;
        let _guard = self.write_lock.lock().await;

        // Each write gets its own temp file; the rename is what readers see.
        let tmp = self
            .path
            .with_extension(format!("json.{}.tmp", Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}
