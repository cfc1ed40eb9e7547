//! Result emission
//!
//! Shaped repositories leave the process either as a plain name listing or as
//! a project descriptor file read by the downstream dashboard tooling.

use serde::Serialize;
use serde_json::{json, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::fetcher::github_config::GithubApiConfig;
use crate::ResourceRecord;

/// Output writer errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error at {path}: {reason}")]
    IoError {
        /// File involved
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// One name per line, in delivery order
pub fn write_name_listing<W: Write>(out: &mut W, records: &[ResourceRecord]) -> OutputResult<()> {
    for record in records {
        writeln!(out, "{}", record.name).map_err(|e| OutputError::IoError {
            path: PathBuf::from("<stdout>"),
            reason: e.to_string(),
        })?;
    }
    out.flush().map_err(|e| OutputError::IoError {
        path: PathBuf::from("<stdout>"),
        reason: e.to_string(),
    })
}

/// Project descriptor: `{ owner: { "git": [urls], "github": [urls] } }`
pub fn project_descriptor(owner: &str, config: &GithubApiConfig, records: &[ResourceRecord]) -> Value {
    let urls: Vec<String> = records
        .iter()
        .map(|r| config.repo_web_url(owner, &r.name))
        .collect();

    let mut projects = serde_json::Map::new();
    projects.insert(owner.to_string(), json!({ "git": urls, "github": urls }));
    Value::Object(projects)
}

/// File name of the project descriptor of `owner`
pub fn project_file_name(owner: &str) -> String {
    format!("{owner}-projects.json")
}

/// Atomically write `value` to `path`, indented with four spaces
pub fn write_project_file<T: Serialize>(path: &Path, value: &T) -> OutputResult<()> {
    let io_error = |e: std::io::Error| OutputError::IoError {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|e| OutputError::SerializationError(e.to_string()))?;

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(io_error)?;

    let mut temp_file = tempfile::NamedTempFile::new_in(parent).map_err(io_error)?;
    temp_file.write_all(&buf).map_err(io_error)?;
    temp_file.flush().map_err(io_error)?;
    temp_file.persist(path).map_err(|e| io_error(e.error))?;

    info!("Project file written to {}", path.display());
    Ok(())
}
