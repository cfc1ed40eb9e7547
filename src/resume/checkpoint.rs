//! Sync points recorded after a committed fetch

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where the next incremental run picks up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "sync_type", rename_all = "snake_case")]
pub enum SyncPoint {
    /// Everything updated up to and including `at` has been delivered
    Timestamp {
        /// Newest update time seen in the committed batch
        at: DateTime<Utc>,
    },
    /// Opaque remote cursor (page token, event id)
    Cursor {
        /// Cursor value handed back by the remote
        cursor: String,
    },
}

impl SyncPoint {
    /// Create a timestamp sync point
    pub fn timestamp(at: DateTime<Utc>) -> Self {
        SyncPoint::Timestamp { at }
    }

    /// Create a cursor sync point
    pub fn cursor(cursor: impl Into<String>) -> Self {
        SyncPoint::Cursor {
            cursor: cursor.into(),
        }
    }

    /// Timestamp, when this is a timestamp sync point
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            SyncPoint::Timestamp { at } => Some(*at),
            SyncPoint::Cursor { .. } => None,
        }
    }
}

impl std::fmt::Display for SyncPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncPoint::Timestamp { at } => write!(f, "timestamp:{}", at.to_rfc3339()),
            SyncPoint::Cursor { cursor } => write!(f, "cursor:{cursor}"),
        }
    }
}
