//! JSON file store
//!
//! All keys live in one JSON object on disk, the same shape as browser local
//! storage. Every write rewrites the document through a temporary file and a
//! rename so readers never observe a half-written file. Concurrent processes
//! get last-writer-wins semantics.

use serde_json::{Map, Value};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use super::{StateStore, StoreError};

/// Store backed by a single JSON document
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    /// Opens (or lazily creates) the store at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Map<String, Value>, StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };

        if contents.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str(&contents)? {
            Value::Object(map) => Ok(map),
            _ => Err(StoreError::Corrupt(format!(
                "{} does not contain a JSON object",
                self.path.display()
            ))),
        }
    }

    fn save(&self, document: &Map<String, Value>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(document)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn update(
        &self,
        apply: impl FnOnce(&mut Map<String, Value>),
    ) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut document = self.load()?;
        apply(&mut document);
        self.save(&document)
    }
}

impl StateStore for JsonFileStore {
    fn read(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.load()?.remove(key))
    }

    fn write(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.update(|document| {
            document.insert(key.to_string(), value);
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.update(|document| {
            document.remove(key);
        })
    }

    fn merge(&self, key: &str, fields: Map<String, Value>) -> Result<(), StoreError> {
        self.update(|document| {
            let entry = document
                .entry(key.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            match entry {
                Value::Object(record) => record.extend(fields),
                other => *other = Value::Object(fields),
            }
        })
    }
}
