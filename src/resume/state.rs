//! Incremental state persistence
//!
//! Implements atomic file writes and schema versioning for per-backend state.
//! One JSON file per backend id lives under the store directory.

use super::checkpoint::SyncPoint;
use chrono::{DateTime, Utc};
use fd_lock::RwLock;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Current state schema version
const SCHEMA_VERSION: &str = "1.0.0";

/// Maximum allowed state file size (1 MB); a state is a handful of fields
pub const MAX_STATE_FILE_SIZE: u64 = 1024 * 1024;

/// Committed progress of one backend instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendState {
    schema_version: String,
    backend_id: String,
    sync_point: SyncPoint,
    unique_id_field: String,
    item_count: u64,
    updated_at: i64,
}

impl BackendState {
    /// Create a new state
    pub fn new(
        backend_id: impl Into<String>,
        sync_point: SyncPoint,
        unique_id_field: impl Into<String>,
        item_count: u64,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            backend_id: backend_id.into(),
            sync_point,
            unique_id_field: unique_id_field.into(),
            item_count,
            updated_at: Utc::now().timestamp_millis(),
        }
    }

    /// Get the backend id
    pub fn backend_id(&self) -> &str {
        &self.backend_id
    }

    /// Get the sync point
    pub fn sync_point(&self) -> &SyncPoint {
        &self.sync_point
    }

    /// Timestamp of the sync point, if it is one
    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.sync_point.as_timestamp()
    }

    /// Get the unique id field of the items
    pub fn unique_id_field(&self) -> &str {
        &self.unique_id_field
    }

    /// Number of items in the committed batch
    pub fn item_count(&self) -> u64 {
        self.item_count
    }

    /// Commit time (Unix milliseconds)
    pub fn updated_at(&self) -> i64 {
        self.updated_at
    }

    /// Get the schema version
    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    /// Validate schema version (accepts current version only)
    pub fn validate_schema_version(&self) -> Result<(), ResumeError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ResumeError::SchemaVersionMismatch {
                expected: SCHEMA_VERSION.to_string(),
                found: self.schema_version.clone(),
            });
        }
        Ok(())
    }
}

/// File-backed store of [`BackendState`]s keyed by backend id
#[derive(Debug, Clone)]
pub struct IncrementalStateStore {
    dir: PathBuf,
}

impl IncrementalStateStore {
    /// Create a store rooted at `dir` (created lazily on first persist)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the state of `backend_id`
    pub fn path_for(&self, backend_id: &str) -> PathBuf {
        let file_name: String = backend_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
            .collect();
        self.dir.join(format!("{file_name}.state.json"))
    }

    /// Restore the last committed state of `backend_id`
    ///
    /// # Errors
    /// [`ResumeError::NotFound`] when nothing was ever committed; callers are
    /// expected to degrade to a fresh run on that error.
    pub fn restore(&self, backend_id: &str) -> Result<BackendState, ResumeError> {
        let path = self.path_for(backend_id);
        if !path.exists() {
            return Err(ResumeError::NotFound(backend_id.to_string()));
        }

        let state = load(&path)?;
        if state.backend_id != backend_id {
            return Err(ResumeError::BackendMismatch {
                expected: backend_id.to_string(),
                found: state.backend_id,
            });
        }
        Ok(state)
    }

    /// Commit `state` for `backend_id`
    pub fn persist(&self, backend_id: &str, state: &BackendState) -> Result<(), ResumeError> {
        save(&self.path_for(backend_id), state)
    }
}

/// Save state to file with atomic writes and file locking
///
/// Uses tempfile::NamedTempFile for the atomic replace and fd-lock to
/// serialize writers.
fn save(path: &Path, state: &BackendState) -> Result<(), ResumeError> {
    debug!(
        path = %path.display(),
        sync_point = %state.sync_point,
        "Saving backend state"
    );

    let parent_dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent_dir).map_err(|e| ResumeError::IoError(e.to_string()))?;

    let json = serde_json::to_string_pretty(state)
        .map_err(|e| ResumeError::SerializationError(e.to_string()))?;

    let lock_file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(path.with_extension("lock"))
        .map_err(|e| ResumeError::LockError(format!("Failed to create lock file: {e}")))?;

    let mut lock = RwLock::new(lock_file);
    let _guard = lock
        .write()
        .map_err(|e| ResumeError::LockError(format!("Failed to acquire write lock: {e}")))?;

    let mut temp_file = tempfile::NamedTempFile::new_in(parent_dir)
        .map_err(|e| ResumeError::IoError(format!("Failed to create temp file: {e}")))?;

    temp_file
        .write_all(json.as_bytes())
        .map_err(|e| ResumeError::IoError(format!("Failed to write to temp file: {e}")))?;
    temp_file
        .flush()
        .map_err(|e| ResumeError::IoError(format!("Failed to flush temp file: {e}")))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| ResumeError::IoError(format!("Failed to sync temp file: {e}")))?;

    temp_file
        .persist(path)
        .map_err(|e| ResumeError::IoError(format!("Failed to persist temp file: {e}")))?;

    if let Ok(dir) = std::fs::File::open(parent_dir) {
        let _ = dir.sync_all();
    }

    info!(
        path = %path.display(),
        backend_id = %state.backend_id,
        items = state.item_count,
        "Backend state saved"
    );
    Ok(())
}

/// Load state from file with locking
fn load(path: &Path) -> Result<BackendState, ResumeError> {
    debug!(path = %path.display(), "Loading backend state");

    let lock_file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(path.with_extension("lock"))
        .map_err(|e| ResumeError::LockError(format!("Failed to create lock file: {e}")))?;

    let lock = RwLock::new(lock_file);
    let _guard = lock
        .read()
        .map_err(|e| ResumeError::LockError(format!("Failed to acquire read lock: {e}")))?;

    let metadata = std::fs::metadata(path).map_err(|e| ResumeError::IoError(e.to_string()))?;
    if metadata.len() > MAX_STATE_FILE_SIZE {
        return Err(ResumeError::StateTooLarge {
            size: metadata.len(),
            max: MAX_STATE_FILE_SIZE,
        });
    }

    let contents = std::fs::read_to_string(path).map_err(|e| ResumeError::IoError(e.to_string()))?;

    let state: BackendState = serde_json::from_str(&contents).map_err(|e| {
        warn!(error = %e, "Failed to deserialize backend state");
        ResumeError::DeserializationError(e.to_string())
    })?;

    if let Err(e) = state.validate_schema_version() {
        warn!(
            found_version = %state.schema_version,
            expected_version = SCHEMA_VERSION,
            "Backend state schema version mismatch"
        );
        return Err(e);
    }

    info!(
        backend_id = %state.backend_id,
        sync_point = %state.sync_point,
        "Backend state loaded"
    );
    Ok(state)
}

/// Errors related to incremental state
#[derive(Debug, thiserror::Error)]
pub enum ResumeError {
    /// No state was ever committed for this backend
    #[error("no state found for backend {0}")]
    NotFound(String),

    /// State file belongs to another backend
    #[error("state belongs to backend {found}, expected {expected}")]
    BackendMismatch {
        /// Requested backend id
        expected: String,
        /// Backend id recorded in the file
        found: String,
    },

    /// Schema version mismatch
    #[error("schema version mismatch: expected {expected}, found {found}")]
    SchemaVersionMismatch {
        /// Expected schema version
        expected: String,
        /// Found schema version
        found: String,
    },

    /// State file too large
    #[error("state file too large: {size} bytes (max: {max} bytes)")]
    StateTooLarge {
        /// Actual file size
        size: u64,
        /// Maximum allowed size
        max: u64,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Deserialization error
    #[error("deserialization error: {0}")]
    DeserializationError(String),

    /// Lock error
    #[error("lock error: {0}")]
    LockError(String),
}
