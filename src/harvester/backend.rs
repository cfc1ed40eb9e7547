//! Backend orchestrator
//!
//! Chooses between resuming from committed state, replaying the cache, or a
//! clean run when constructed, and keeps that choice for its whole lifetime.

use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::cache::CacheLayer;
use crate::harvester::{HarvestError, HarvestResult, Source};
use crate::resume::{BackendState, IncrementalStateStore, ResumeError, SyncPoint};

/// Construction options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendOptions {
    /// Serve results from the cache snapshot instead of the network
    pub use_cache: bool,
    /// Resume from the last committed state
    pub incremental: bool,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            use_cache: false,
            incremental: true,
        }
    }
}

/// Path chosen at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendMode {
    /// Full fetch from the network; cache rebuilt from scratch
    Fresh,
    /// Fetch only what changed since the restored state
    Resuming,
    /// No network; results rebuilt from the cache snapshot
    CacheReplay,
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BackendMode::Fresh => "fresh",
            BackendMode::Resuming => "resuming",
            BackendMode::CacheReplay => "cache-replay",
        };
        write!(f, "{s}")
    }
}

/// Result of one [`Backend::fetch`]
#[derive(Debug, Clone)]
pub struct FetchOutcome<T> {
    /// Shaped items
    pub items: Vec<T>,
    /// Mode the fetch ran in
    pub mode: BackendMode,
    /// False when the network fetch stopped early
    pub complete: bool,
    /// Whether a new state was persisted
    pub committed: bool,
}

/// Backend instance bound to one source
pub struct Backend<S: Source> {
    source: S,
    mode: BackendMode,
    state: Option<BackendState>,
    storage_dir: PathBuf,
    cache: CacheLayer,
    state_store: IncrementalStateStore,
}

impl<S: Source> Backend<S> {
    /// Create a backend storing its data under `storage_root`
    ///
    /// The instance owns `<storage_root>/<source name>/<source id>/`.
    ///
    /// # Errors
    /// [`HarvestError::Storage`] when that directory cannot be created or
    /// written. There is no fallback location.
    pub fn new(source: S, storage_root: &Path, options: BackendOptions) -> HarvestResult<Self> {
        let storage_dir = storage_root
            .join(path_component(source.name()))
            .join(path_component(&source.id()));

        std::fs::create_dir_all(&storage_dir).map_err(|e| HarvestError::Storage {
            path: storage_dir.clone(),
            reason: e.to_string(),
        })?;

        let cache = CacheLayer::open(storage_dir.join("cache"), source.unique_id_field()).map_err(
            |e| HarvestError::Storage {
                path: storage_dir.join("cache"),
                reason: e.to_string(),
            },
        )?;

        let state_dir = storage_dir.join("state");
        std::fs::create_dir_all(&state_dir).map_err(|e| HarvestError::Storage {
            path: state_dir.clone(),
            reason: e.to_string(),
        })?;
        let state_store = IncrementalStateStore::new(state_dir);

        let mut backend = Self {
            source,
            mode: BackendMode::Fresh,
            state: None,
            storage_dir,
            cache,
            state_store,
        };

        if options.use_cache {
            if options.incremental {
                debug!("Cache replay requested: incremental mode disabled");
            }
            backend.mode = BackendMode::CacheReplay;
        } else if options.incremental {
            backend.restore_state();
        }

        if backend.mode == BackendMode::Fresh {
            backend.cache.clear().map_err(|e| HarvestError::Storage {
                path: backend.cache.dir().to_path_buf(),
                reason: e.to_string(),
            })?;
        }

        info!(
            backend_id = %backend.backend_id(),
            mode = %backend.mode,
            storage = %backend.storage_dir.display(),
            "Backend ready"
        );
        Ok(backend)
    }

    fn restore_state(&mut self) {
        let backend_id = self.backend_id();
        match self.state_store.restore(&backend_id) {
            Ok(state) => {
                info!(
                    backend_id = %backend_id,
                    sync_point = %state.sync_point(),
                    "Resuming from last committed state"
                );
                self.state = Some(state);
                self.mode = BackendMode::Resuming;
            }
            Err(ResumeError::NotFound(_)) => {
                info!("No previous state for {}. Incremental disabled.", backend_id);
            }
            Err(e) => {
                warn!("Unusable state for {}: {}. Incremental disabled.", backend_id, e);
            }
        }
    }

    /// Unique identifier of this backend instance (`<source name>:<source id>`)
    pub fn backend_id(&self) -> String {
        format!("{}:{}", self.source.name(), self.source.id())
    }

    /// Mode chosen at construction
    pub fn mode(&self) -> BackendMode {
        self.mode
    }

    /// Whether this instance resumes from committed state
    pub fn is_incremental(&self) -> bool {
        self.mode == BackendMode::Resuming
    }

    /// Whether results come from the cache snapshot
    pub fn uses_cache(&self) -> bool {
        self.mode == BackendMode::CacheReplay
    }

    /// State this instance resumes from (updated after each commit)
    pub fn state(&self) -> Option<&BackendState> {
        self.state.as_ref()
    }

    /// Directory owned by this instance
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Cache snapshot handle
    pub fn cache(&self) -> &CacheLayer {
        &self.cache
    }

    /// Underlying source
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fetch items along the path chosen at construction
    pub async fn fetch(&mut self) -> HarvestResult<FetchOutcome<S::Item>> {
        match self.mode {
            BackendMode::CacheReplay => self.replay_cache(),
            BackendMode::Fresh | BackendMode::Resuming => self.fetch_live().await,
        }
    }

    /// Every item known to this instance, shaped
    ///
    /// A resuming fetch only delivers what changed since the last commit;
    /// the snapshot adds everything cached by earlier runs, so consumers that
    /// rewrite a complete listing can use it after [`Backend::fetch`].
    pub fn snapshot(&self) -> HarvestResult<Vec<S::Item>> {
        Ok(self.source.shape(self.cached_items()?))
    }

    fn replay_cache(&self) -> HarvestResult<FetchOutcome<S::Item>> {
        let items = self.cached_items()?;
        info!(items = items.len(), "Items replayed from cache");
        Ok(FetchOutcome {
            items: self.source.shape(items),
            mode: self.mode,
            complete: true,
            committed: false,
        })
    }

    /// Cached items in append order; a repeated id keeps its first position
    /// and its last content
    fn cached_items(&self) -> HarvestResult<Vec<S::Item>> {
        let mut items: Vec<S::Item> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for record in self.cache.iterate()? {
            let record = record?;
            let item: S::Item = serde_json::from_value(record.raw_item)
                .map_err(|e| HarvestError::Item(format!("cached item {}: {e}", record.unique_id)))?;

            match positions.get(&record.unique_id) {
                Some(&position) => items[position] = item,
                None => {
                    positions.insert(record.unique_id, items.len());
                    items.push(item);
                }
            }
        }

        Ok(items)
    }

    async fn fetch_live(&mut self) -> HarvestResult<FetchOutcome<S::Item>> {
        let batch = self.source.fetch(self.state.as_ref()).await?;

        if !batch.complete {
            warn!(
                items = batch.items.len(),
                "Fetch interrupted; delivering partial results without committing state"
            );
        }

        let field = self.source.unique_id_field().to_string();
        let raw = batch
            .items
            .iter()
            .map(|item| {
                let value = serde_json::to_value(item)
                    .map_err(|e| HarvestError::Item(e.to_string()))?;
                let id = unique_id_of(&value, &field)?;
                Ok((id, value))
            })
            .collect::<HarvestResult<Vec<(String, Value)>>>()?;
        self.cache
            .put_all(raw.iter().map(|(id, value)| (id.as_str(), value)))?;

        let committed = batch.complete && self.commit(&batch.items)?;

        Ok(FetchOutcome {
            items: self.source.shape(batch.items),
            mode: self.mode,
            complete: batch.complete,
            committed,
        })
    }

    /// Persist the sync point reached by a complete batch
    ///
    /// An empty batch never touches the stored state.
    fn commit(&mut self, items: &[S::Item]) -> HarvestResult<bool> {
        if items.is_empty() {
            debug!("Nothing fetched; previous state left untouched");
            return Ok(false);
        }

        let newest = items
            .iter()
            .filter_map(|item| self.source.updated_at(item))
            .max()
            .unwrap_or_else(Utc::now);
        let newest = match self.state.as_ref().and_then(|s| s.last_sync()) {
            Some(previous) if previous > newest => previous,
            _ => newest,
        };

        let backend_id = self.backend_id();
        let state = BackendState::new(
            backend_id.as_str(),
            SyncPoint::timestamp(newest),
            self.source.unique_id_field(),
            items.len() as u64,
        );
        self.state_store.persist(&backend_id, &state)?;
        self.state = Some(state);
        Ok(true)
    }
}

/// Value of `field` in a raw item, as a string
fn unique_id_of(value: &Value, field: &str) -> HarvestResult<String> {
    match value.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Null) | None => Err(HarvestError::Item(format!(
            "item has no unique id field '{field}'"
        ))),
        Some(other) => Ok(other.to_string()),
    }
}

/// Directory name safe for any id
fn path_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}
