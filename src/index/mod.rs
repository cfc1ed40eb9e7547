//! Helpers consumed by the downstream indexer
//!
//! Nothing in the fetch path depends on this module. It builds the query
//! clause that scopes an index to one origin and submits fetched items as a
//! single bulk write.

pub mod bulk;
pub mod filter;

pub use bulk::{build_bulk_body, BulkSink};
pub use filter::{repository_filter, OriginInfo, RepositoryFilter};

/// Index errors
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Request could not be sent
    #[error("index transport error: {0}")]
    Transport(String),

    /// Index answered with a non-success status
    #[error("index returned HTTP {status}: {body}")]
    HttpStatus {
        /// Status code
        status: u16,
        /// Response body, for diagnostics
        body: String,
    },

    /// Item could not be serialized
    #[error("index serialization error: {0}")]
    Serialization(String),

    /// Index answered 2xx but reported per-item failures
    #[error("bulk write reported errors for {failed} of {total} items")]
    PartialFailure {
        /// Items rejected
        failed: usize,
        /// Items submitted
        total: usize,
    },
}

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;
