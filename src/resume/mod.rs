//! Incremental state for backend instances
//!
//! Provides persistent per-backend sync points with atomic writes and file locking.

pub mod checkpoint;
pub mod state;

pub use checkpoint::SyncPoint;
pub use state::{BackendState, IncrementalStateStore, ResumeError};
