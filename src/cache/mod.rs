//! On-disk snapshot of raw items
//!
//! Items are appended as JSON lines while a live fetch runs, so a later run
//! can rebuild its result set without touching the network. Entries are never
//! rewritten in place; the whole snapshot is replaced by [`CacheLayer::clear`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name of the snapshot inside the cache directory
const ITEMS_FILE: &str = "items.jsonl";

/// Cache errors
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// IO error
    #[error("cache IO error at {path}: {source}")]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Serialization error
    #[error("cache serialization error: {0}")]
    Serialization(String),

    /// Line that does not decode into a cached record
    #[error("corrupt cache entry at line {line}: {reason}")]
    Corrupt {
        /// 1-based line number
        line: usize,
        /// Decoder message
        reason: String,
    },
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// One cached raw item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedItemRecord {
    /// Value of the item's unique id field
    pub unique_id: String,
    /// Item exactly as fetched
    pub raw_item: Value,
}

/// Append-only JSON-lines snapshot owned by one backend instance
#[derive(Debug)]
pub struct CacheLayer {
    dir: PathBuf,
    unique_id_field: String,
}

impl CacheLayer {
    /// Open (creating if needed) the cache under `dir`
    ///
    /// Fails when the directory cannot be created or the snapshot file is not
    /// writable, so an unusable storage location is detected up front.
    pub fn open(dir: impl Into<PathBuf>, unique_id_field: impl Into<String>) -> CacheResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| CacheError::Io {
            path: dir.clone(),
            source,
        })?;

        let cache = Self {
            dir,
            unique_id_field: unique_id_field.into(),
        };
        cache.append_handle()?;
        Ok(cache)
    }

    /// Cache directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Field of the raw items holding their unique id
    pub fn unique_id_field(&self) -> &str {
        &self.unique_id_field
    }

    /// Snapshot file
    pub fn items_path(&self) -> PathBuf {
        self.dir.join(ITEMS_FILE)
    }

    /// Append one item
    pub fn put(&self, unique_id: &str, raw_item: &Value) -> CacheResult<()> {
        self.put_all(std::iter::once((unique_id, raw_item)))
    }

    /// Append a batch of items with a single open/flush
    pub fn put_all<'a, I>(&self, items: I) -> CacheResult<()>
    where
        I: IntoIterator<Item = (&'a str, &'a Value)>,
    {
        let mut file = self.append_handle()?;
        let mut written = 0usize;

        for (unique_id, raw_item) in items {
            let record = CachedItemRecord {
                unique_id: unique_id.to_string(),
                raw_item: raw_item.clone(),
            };
            let mut line = serde_json::to_string(&record)
                .map_err(|e| CacheError::Serialization(e.to_string()))?;
            line.push('\n');
            file.write_all(line.as_bytes()).map_err(|source| self.io_error(source))?;
            written += 1;
        }

        file.flush().map_err(|source| self.io_error(source))?;
        debug!(items = written, dir = %self.dir.display(), "Appended items to cache");
        Ok(())
    }

    /// Lazily iterate over cached items in append order
    pub fn iterate(&self) -> CacheResult<CacheIter> {
        let path = self.items_path();
        let reader = match File::open(&path) {
            Ok(file) => Some(BufReader::new(file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(source) => return Err(CacheError::Io { path, source }),
        };

        Ok(CacheIter {
            lines: reader.map(|r| r.lines()),
            path,
            line: 0,
        })
    }

    /// Number of cached entries (duplicates included)
    pub fn len(&self) -> CacheResult<usize> {
        let mut count = 0;
        for record in self.iterate()? {
            record?;
            count += 1;
        }
        Ok(count)
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Drop every cached item
    pub fn clear(&self) -> CacheResult<()> {
        File::create(self.items_path()).map_err(|source| self.io_error(source))?;
        info!(dir = %self.dir.display(), "Cache cleared");
        Ok(())
    }

    fn append_handle(&self) -> CacheResult<File> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.items_path())
            .map_err(|source| self.io_error(source))
    }

    fn io_error(&self, source: std::io::Error) -> CacheError {
        CacheError::Io {
            path: self.items_path(),
            source,
        }
    }
}

/// Lazy iterator over a cache snapshot
pub struct CacheIter {
    lines: Option<std::io::Lines<BufReader<File>>>,
    path: PathBuf,
    line: usize,
}

impl Iterator for CacheIter {
    type Item = CacheResult<CachedItemRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let raw = match self.lines.as_mut()?.next()? {
                Ok(raw) => raw,
                Err(source) => {
                    self.lines = None;
                    return Some(Err(CacheError::Io {
                        path: self.path.clone(),
                        source,
                    }));
                }
            };
            self.line += 1;

            if raw.trim().is_empty() {
                continue;
            }

            return Some(serde_json::from_str(&raw).map_err(|e| CacheError::Corrupt {
                line: self.line,
                reason: e.to_string(),
            }));
        }
    }
}
