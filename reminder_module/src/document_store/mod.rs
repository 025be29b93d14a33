//! Key-path document store used for reminders and links.
//!
//! Paths are `/`-separated segments (`reminders/alice@x_com/r1`). Reads return
//! the whole subtree under a path as JSON, writes either replace a subtree or
//! merge child fields into it.

mod firebase;
mod sqlite;

use serde_json::{Map, Value};

pub use firebase::FirebaseDocumentStore;
pub use sqlite::SqliteDocumentStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("store returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid path: {0}")]
    InvalidPath(String),
}

pub trait DocumentStore: Send + Sync {
    /// Snapshot of the subtree at `path`, `None` when nothing is stored there.
    fn get(&self, path: &str) -> Result<Option<Value>, StoreError>;

    /// Replace the subtree at `path` with `value`.
    fn set(&self, path: &str, value: &Value) -> Result<(), StoreError>;

    /// Write each of `fields` as a child of `path`, leaving siblings untouched.
    fn update(&self, path: &str, fields: &Map<String, Value>) -> Result<(), StoreError>;

    /// Cheap round trip used as the readiness check before scheduling starts.
    fn ping(&self) -> Result<(), StoreError>;
}

/// Split a path into validated segments.
///
/// Segments may not be empty or contain `.`, `#`, `$`, `[` or `]`.
pub fn split_path(path: &str) -> Result<Vec<&str>, StoreError> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let mut segments = Vec::new();
    for segment in trimmed.split('/') {
        if segment.is_empty()
            || segment
                .chars()
                .any(|ch| matches!(ch, '.' | '#' | '$' | '[' | ']') || ch.is_control())
        {
            return Err(StoreError::InvalidPath(path.to_string()));
        }
        segments.push(segment);
    }
    Ok(segments)
}

pub fn normalize_path(path: &str) -> Result<String, StoreError> {
    Ok(split_path(path)?.join("/"))
}

pub fn join_path(base: &str, child: &str) -> String {
    let base = base.trim_matches('/');
    if base.is_empty() {
        child.to_string()
    } else {
        format!("{}/{}", base, child)
    }
}
