//! Key/value state store
//!
//! A passive serialization target for persisted run state. Values are JSON
//! documents keyed by string; `merge` applies a partial write on top of the
//! existing record.

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use serde_json::{Map, Value};
use thiserror::Error;

/// Errors that can occur when reading or writing the store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt store: {0}")]
    Corrupt(String),
}

/// Durable key/value storage shared by every pipeline record
pub trait StateStore: Send + Sync {
    /// Reads the value stored under `key`
    fn read(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Replaces the value stored under `key`
    fn write(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Removes `key` from the store
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Merges `fields` into the object stored under `key`
    ///
    /// Fields not present in `fields` keep their stored value. A missing or
    /// non-object record is replaced by `fields`.
    fn merge(&self, key: &str, fields: Map<String, Value>) -> Result<(), StoreError> {
        let mut record = match self.read(key)? {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        record.extend(fields);
        self.write(key, Value::Object(record))
    }
}
