//! Harvest orchestration and rate limiting
//!
//! This module provides the backend state machine that decides, once per
//! instance, whether a run resumes from committed state, replays the local
//! cache, or starts clean, and then exposes one [`Backend::fetch`] contract
//! regardless of the path taken.
//!
//! # Overview
//!
//! 1. **Source**: a concrete data source implements [`Source`]
//! 2. **Construction**: [`Backend::new`] picks a [`BackendMode`]
//! 3. **Rate Limiting**: page requests are gated by [`rate_limit::RateLimiter`]
//! 4. **Shaping**: results pass through [`Source::shape`] (see [`filter::ResourceFilter`])
//! 5. **Commit**: a complete, non-empty batch advances the persisted [`BackendState`]
//!
//! # Error Handling
//!
//! Storage failures ([`HarvestError::Storage`], and cache or state writes
//! failing mid-run) and an unresolvable owner
//! ([`FetcherError::AuthResolution`]) reach the caller. Transport failures
//! produce a partial batch, rate limits are waited out, and a missing state
//! degrades to a fresh run.
//!
//! # Related Modules
//!
//! - [`crate::fetcher`] - Page transport and pagination
//! - [`crate::resume`] - State persistence
//! - [`crate::cache`] - Cache snapshot

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;

use crate::cache::CacheError;
use crate::fetcher::{FetcherError, FetcherResult};
use crate::resume::{BackendState, ResumeError};

pub mod backend;
pub mod config;
pub mod filter;
pub mod rate_limit;

pub use backend::{Backend, BackendMode, BackendOptions, FetchOutcome};
pub use filter::ResourceFilter;
pub use rate_limit::{RateLimitWindow, RateLimiter};

/// Harvest errors
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// Storage location cannot be created or written
    #[error("storage error at {path}: {reason}")]
    Storage {
        /// Storage directory
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// Unrecoverable fetch failure
    #[error("fetch error: {0}")]
    Fetch(#[from] FetcherError),

    /// Cache failure outside construction
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// State could not be committed
    #[error("state error: {0}")]
    State(#[from] ResumeError),

    /// Item could not be converted to or from its raw form
    #[error("item error: {0}")]
    Item(String),
}

/// Result type for harvest operations
pub type HarvestResult<T> = Result<T, HarvestError>;

/// Items produced by one source fetch
#[derive(Debug, Clone)]
pub struct SourceBatch<T> {
    /// Items in remote order
    pub items: Vec<T>,
    /// False when the fetch stopped early (transport failure); such a batch
    /// is delivered but never committed
    pub complete: bool,
}

impl<T> SourceBatch<T> {
    /// Batch covering the whole collection
    pub fn complete(items: Vec<T>) -> Self {
        Self {
            items,
            complete: true,
        }
    }

    /// Best-effort batch from an interrupted fetch
    pub fn partial(items: Vec<T>) -> Self {
        Self {
            items,
            complete: false,
        }
    }
}

/// Capability contract of a concrete data source
///
/// A backend is generic over its source, so dispatch is resolved at compile
/// time.
#[async_trait]
pub trait Source: Send + Sync {
    /// Item produced by this source
    type Item: Serialize + DeserializeOwned + Clone + Send + Sync;

    /// Human name of the source kind (e.g., "github")
    fn name(&self) -> &str;

    /// Unique identifier of this source instance (e.g., the owner)
    fn id(&self) -> String;

    /// Field of the raw items holding their unique id
    fn unique_id_field(&self) -> &str;

    /// Last update time of an item, used to advance the sync point
    fn updated_at(&self, item: &Self::Item) -> Option<DateTime<Utc>>;

    /// Fetch items from the remote, starting after `since` when given
    async fn fetch(&self, since: Option<&BackendState>) -> FetcherResult<SourceBatch<Self::Item>>;

    /// Final ordering/selection applied to every delivered result set
    fn shape(&self, items: Vec<Self::Item>) -> Vec<Self::Item> {
        items
    }
}
