//! # Repo Harvester Library
//!
//! Harvests the repositories owned by a GitHub organization or user from the
//! paginated, rate-limited REST API and hands them to a downstream ingestion
//! pipeline. Progress is tracked per backend instance so repeated runs are
//! incremental instead of full re-scans.
//!
//! ## Features
//!
//! - **Link-based pagination**: follows `rel="next"` until the collection is exhausted
//! - **Rate-limit awareness**: blocks until the quota window resets instead of failing
//! - **Incremental runs**: restores the last committed sync point per backend instance
//! - **Cache replay**: rebuilds the result set from a local snapshot without touching the network
//! - **Owner resolution**: organization endpoint first, user endpoint as a single fallback
//!
//! ## Quick Start
//!
//! ```no_run
//! use repo_harvester::fetcher::github::GithubRepositories;
//! use repo_harvester::fetcher::github_config::GITHUB_CONFIG;
//! use repo_harvester::harvester::{Backend, BackendOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source = GithubRepositories::new(GITHUB_CONFIG.clone(), "grimoirelab", None, 10)?;
//! let mut backend = Backend::new(source, "/tmp/harvest".as_ref(), BackendOptions::default())?;
//!
//! let outcome = backend.fetch().await?;
//! for repo in &outcome.items {
//!     println!("{}", repo.name);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`fetcher`] - HTTP transport, pagination and the GitHub repository source
//! - [`harvester`] - Rate limiting, result shaping and the backend orchestrator
//! - [`resume`] - Persisted incremental state
//! - [`cache`] - On-disk snapshot of raw items used for cache replay
//! - [`index`] - Helpers consumed by the downstream indexer (filters, bulk writes)
//! - [`output`] - Name listings and project descriptor files
//! - [`dates`] - Date and time helpers

#![warn(missing_docs)]
#![warn(clippy::all)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// On-disk snapshot of raw items
pub mod cache;

/// CLI command implementations
pub mod cli;

/// Date and time helpers
pub mod dates;

/// Remote API access
pub mod fetcher;

/// Harvest orchestration and rate limiting
pub mod harvester;

/// Helpers for the downstream index
pub mod index;

/// Result emission
pub mod output;

/// Incremental state persistence
pub mod resume;

pub use harvester::{Backend, BackendMode, BackendOptions, FetchOutcome, Source};

/// One repository from a paginated repository listing
///
/// Field names follow the GitHub payload; everything else in the payload is
/// ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceRecord {
    /// Repository name (unique within its owner)
    pub name: String,
    /// Last update time
    pub updated_at: DateTime<Utc>,
    /// Repository size in kilobytes
    pub size: u64,
    /// Whether the repository is a fork of another one
    #[serde(rename = "fork")]
    pub is_fork: bool,
}

impl ResourceRecord {
    /// Validate record integrity
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Repository name cannot be empty".to_string());
        }

        Ok(())
    }
}
