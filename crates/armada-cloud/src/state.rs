//! State management for cloud resources
//!
//! Manages the `.armada/state.json` file which records the ID and last
//! observed attributes of every managed remote object.

use crate::error::{CloudError, Result};
use crate::id::RemoteObjectId;
use crate::mapper::ResourceKind;
use crate::reconciler::TrackedObject;
use crate::value::ObservedState;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const STATE_VERSION: u32 = 1;
const STATE_DIR: &str = ".armada";
const STATE_FILE: &str = "state.json";
const STATE_BACKUP: &str = "state.json.backup";
const STATE_STAGING: &str = "state.json.tmp";
const LOCK_FILE: &str = "lock.json";

/// Locks older than this are considered abandoned
const STALE_LOCK_SECS: i64 = 60 * 60;

/// Global state containing all managed resources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalState {
    /// State file version
    pub version: u32,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    /// Resources indexed by their manifest key
    pub resources: BTreeMap<String, ResourceState>,
}

impl Default for GlobalState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            resources: BTreeMap::new(),
        }
    }
}

impl GlobalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or update a resource
    pub fn set_resource(&mut self, key: String, state: ResourceState) {
        self.resources.insert(key, state);
        self.updated_at = Utc::now();
    }

    /// Remove a resource
    pub fn remove_resource(&mut self, key: &str) -> Option<ResourceState> {
        let result = self.resources.remove(key);
        if result.is_some() {
            self.updated_at = Utc::now();
        }
        result
    }

    /// Get a resource by key
    pub fn get_resource(&self, key: &str) -> Option<&ResourceState> {
        self.resources.get(key)
    }

    /// Record a successful create, update or refresh
    pub fn record(&mut self, key: &str, kind: &str, tracked: &TrackedObject) {
        let created_at = self
            .resources
            .get(key)
            .filter(|r| r.kind == kind)
            .map(|r| r.created_at);
        let mut state = ResourceState::present(kind, tracked);
        if let Some(created_at) = created_at {
            state.created_at = created_at;
        }
        self.set_resource(key.to_string(), state);
    }
}

/// State of a single resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceState {
    /// Remote object ID
    pub id: String,

    /// Resource kind
    pub kind: String,

    /// Current status
    pub status: ResourceStatus,

    /// Attributes from the last successful read
    #[serde(default)]
    pub attributes: ObservedState,

    /// When the resource was created
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl ResourceState {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            kind: kind.into(),
            status: ResourceStatus::Unconfirmed,
            attributes: ObservedState::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// A resource whose remote state was just read
    pub fn present(kind: impl Into<String>, tracked: &TrackedObject) -> Self {
        let mut state = Self::new(tracked.id.to_string(), kind);
        state.status = ResourceStatus::Present;
        state.attributes = tracked.observed.clone();
        state
    }

    /// A resource whose create outcome is unknown (timed out or interrupted)
    pub fn unconfirmed(kind: impl Into<String>, id: &RemoteObjectId) -> Self {
        Self::new(id.to_string(), kind)
    }

    pub fn with_status(mut self, status: ResourceStatus) -> Self {
        self.status = status;
        self
    }

    /// Parse the stored ID back into a tracked object
    pub fn tracked(&self, kind: &dyn ResourceKind) -> Result<TrackedObject> {
        Ok(TrackedObject {
            id: RemoteObjectId::parse_insensitively(&self.id, kind.id_shape())?,
            observed: self.attributes.clone(),
        })
    }
}

/// Status of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Last read found the object
    Present,
    /// A create did not report completion; the next refresh decides
    Unconfirmed,
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceStatus::Present => write!(f, "present"),
            ResourceStatus::Unconfirmed => write!(f, "unconfirmed"),
        }
    }
}

/// Reads and writes `.armada/state.json` under a project root
pub struct StateManager {
    dir: PathBuf,
}

impl StateManager {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            dir: project_root.as_ref().join(STATE_DIR),
        }
    }

    pub fn state_path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    /// Load the state; a missing file is an empty state
    pub async fn load(&self) -> Result<GlobalState> {
        let path = self.state_path();
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no state file yet");
                return Ok(GlobalState::new());
            }
            Err(e) => return Err(e.into()),
        };

        let state: GlobalState = serde_json::from_str(&content).map_err(|e| {
            CloudError::StateError(format!("{} is corrupt: {}", path.display(), e))
        })?;
        if state.version > STATE_VERSION {
            return Err(CloudError::StateError(format!(
                "{} was written by a newer armada (format {}, this build reads up to {})",
                path.display(),
                state.version,
                STATE_VERSION
            )));
        }

        tracing::debug!(resources = state.resources.len(), "loaded state");
        Ok(state)
    }

    /// Replace the state file, keeping the previous one as a backup
    ///
    /// The new content is written next to the target and renamed over it,
    /// so a crash never leaves a half-written state file.
    pub async fn save(&self, state: &GlobalState) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;

        let path = self.state_path();
        let staging = self.dir.join(STATE_STAGING);
        fs::write(&staging, serde_json::to_vec_pretty(state)?).await?;

        match fs::copy(&path, self.dir.join(STATE_BACKUP)).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        fs::rename(&staging, &path).await?;

        tracing::debug!(resources = state.resources.len(), "saved state");
        Ok(())
    }

    /// Take the advisory lock that serializes armada processes on this project
    ///
    /// A lock older than an hour is taken over.
    pub async fn acquire_lock(&self) -> Result<StateLock> {
        fs::create_dir_all(&self.dir).await?;
        let lock_path = self.dir.join(LOCK_FILE);

        let holder = LockHolder {
            host: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            pid: std::process::id(),
            acquired_at: Utc::now(),
        };
        let content = serde_json::to_vec_pretty(&holder)?;

        for _ in 0..2 {
            let created = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
                .await;
            match created {
                Ok(mut file) => {
                    file.write_all(&content).await?;
                    file.flush().await?;
                    tracing::debug!(path = %lock_path.display(), "acquired state lock");
                    return Ok(StateLock {
                        lock_path,
                        released: false,
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    let existing = fs::read_to_string(&lock_path).await.unwrap_or_default();
                    match serde_json::from_str::<LockHolder>(&existing) {
                        Ok(other)
                            if Utc::now() - other.acquired_at
                                < TimeDelta::seconds(STALE_LOCK_SECS) => {
                            return Err(CloudError::LockError(format!(
                                "state is locked by {} (pid {}) since {}",
                                other.host, other.pid, other.acquired_at
                            )));
                        }
                        Ok(other) => {
                            tracing::warn!(holder = %other.host, pid = other.pid, "taking over stale state lock");
                        }
                        Err(_) => tracing::warn!("replacing unreadable state lock"),
                    }
                    fs::remove_file(&lock_path).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(CloudError::LockError(format!(
            "{} keeps reappearing; another armada process is starting",
            lock_path.display()
        )))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LockHolder {
    host: String,
    #[serde(default)]
    pid: u32,
    acquired_at: DateTime<Utc>,
}

/// Held state lock; removed on release or drop
pub struct StateLock {
    lock_path: PathBuf,
    released: bool,
}

impl StateLock {
    pub async fn release(mut self) -> Result<()> {
        self.released = true;
        match fs::remove_file(&self.lock_path).await {
            Ok(()) => {
                tracing::debug!("released state lock");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if !self.released {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}
