use std::path::PathBuf;
use std::time::Duration;

use rusqlite::{params, Connection, Transaction};
use serde_json::{Map, Value};

use super::{join_path, normalize_path, DocumentStore, StoreError};

/// Local document store backed by one SQLite table of leaves.
///
/// Objects are flattened on write (`reminders/a/r1/text` -> `"..."`) and
/// reassembled on read, which gives the same subtree and field-merge behavior
/// as the hosted realtime database.
#[derive(Debug, Clone)]
pub struct SqliteDocumentStore {
    path: PathBuf,
}

impl SqliteDocumentStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self { path: path.into() };
        let _ = store.open()?;
        Ok(store)
    }

    fn open(&self) -> Result<Connection, StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS documents (
                path TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;
        Ok(conn)
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let path = normalize_path(path)?;
        let conn = self.open()?;
        let mut rows = Vec::new();
        if path.is_empty() {
            let mut stmt = conn.prepare("SELECT path, value FROM documents ORDER BY path")?;
            let mapped = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in mapped {
                rows.push(row?);
            }
        } else {
            let (lower, upper) = subtree_bounds(&path);
            let mut stmt = conn.prepare(
                "SELECT path, value FROM documents
                 WHERE path = ?1 OR (path >= ?2 AND path < ?3)
                 ORDER BY path",
            )?;
            let mapped = stmt.query_map(params![path, lower, upper], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in mapped {
                rows.push(row?);
            }
        }

        if rows.is_empty() {
            return Ok(None);
        }
        if let Some((_, value)) = rows.iter().find(|(row_path, _)| *row_path == path) {
            return Ok(Some(serde_json::from_str(value)?));
        }

        let prefix_len = if path.is_empty() { 0 } else { path.len() + 1 };
        let mut root = Map::new();
        for (row_path, raw) in rows {
            let relative = &row_path[prefix_len..];
            let value: Value = serde_json::from_str(&raw)?;
            insert_leaf(&mut root, relative, value);
        }
        Ok(Some(Value::Object(root)))
    }

    fn set(&self, path: &str, value: &Value) -> Result<(), StoreError> {
        let path = normalize_path(path)?;
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        write_subtree(&tx, &path, value)?;
        tx.commit()?;
        Ok(())
    }

    fn update(&self, path: &str, fields: &Map<String, Value>) -> Result<(), StoreError> {
        let path = normalize_path(path)?;
        for key in fields.keys() {
            normalize_path(key)?;
        }
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        for (key, value) in fields {
            write_subtree(&tx, &join_path(&path, key), value)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn ping(&self) -> Result<(), StoreError> {
        let conn = self.open()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }
}

fn subtree_bounds(path: &str) -> (String, String) {
    // '0' sorts right after '/', so [path/, path0) covers every descendant.
    (format!("{}/", path), format!("{}0", path))
}

fn write_subtree(tx: &Transaction<'_>, path: &str, value: &Value) -> Result<(), StoreError> {
    if path.is_empty() {
        tx.execute("DELETE FROM documents", [])?;
    } else {
        let (lower, upper) = subtree_bounds(path);
        tx.execute(
            "DELETE FROM documents WHERE path = ?1 OR (path >= ?2 AND path < ?3)",
            params![path, lower, upper],
        )?;
        // A scalar stored at an ancestor would shadow the new subtree.
        let mut ancestor = String::new();
        let segments: Vec<&str> = path.split('/').collect();
        for segment in &segments[..segments.len() - 1] {
            if !ancestor.is_empty() {
                ancestor.push('/');
            }
            ancestor.push_str(segment);
            tx.execute("DELETE FROM documents WHERE path = ?1", params![ancestor])?;
        }
    }

    let mut leaves = Vec::new();
    flatten(path, value, &mut leaves);
    for (leaf_path, leaf) in leaves {
        if leaf_path.is_empty() {
            return Err(StoreError::InvalidPath(
                "cannot store a scalar at the root".to_string(),
            ));
        }
        normalize_path(&leaf_path)?;
        tx.execute(
            "INSERT INTO documents (path, value) VALUES (?1, ?2)",
            params![leaf_path, serde_json::to_string(leaf)?],
        )?;
    }
    Ok(())
}

fn flatten<'a>(path: &str, value: &'a Value, out: &mut Vec<(String, &'a Value)>) {
    match value {
        Value::Null => {}
        Value::Object(map) => {
            for (key, child) in map {
                flatten(&join_path(path, key), child, out);
            }
        }
        _ => out.push((path.to_string(), value)),
    }
}

fn insert_leaf(root: &mut Map<String, Value>, relative: &str, value: Value) {
    let mut segments = relative.split('/').peekable();
    let mut current = root;
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            current.insert(segment.to_string(), value);
            return;
        }
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        current = match entry {
            Value::Object(map) => map,
            _ => return,
        };
    }
}
