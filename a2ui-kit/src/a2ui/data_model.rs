//! A2UI Data Model
//!
//! The DataModel is the binding source of a surface: a JSON document addressed
//! with JSON Pointer paths. Every write produces a new document, so snapshots
//! handed out earlier keep describing the state at the time they were taken.

use std::sync::Arc;

use indexmap::IndexSet;
use serde_json::{Map, Value};

use super::error::Result;
use super::pointer;

/// A copy-on-write data model that stores values accessible via JSON Pointer paths.
///
/// The data model supports:
/// - Getting values by path
/// - Shallow merges from the server (`dataModelUpdate`)
/// - Local writes from input widgets, tracked as pending until the server
///   confirms them
///
/// # Example
///
/// ```rust,ignore
/// let mut model = DataModel::new();
///
/// model.set("/user/name", json!("Alice"))?;
/// let before = model.snapshot();
/// model.set("/user/name", json!("Bob"))?;
///
/// assert_eq!(before.pointer("/user/name"), Some(&json!("Alice")));
/// assert_eq!(model.get_string("/user/name"), Some("Bob"));
/// ```
#[derive(Debug, Clone)]
pub struct DataModel {
    /// The root data value
    data: Arc<Value>,

    /// Paths written locally and not yet confirmed by the server
    pending: IndexSet<String>,

    /// Version counter for change detection
    version: u64,
}

impl Default for DataModel {
    fn default() -> Self {
        Self::new()
    }
}

impl DataModel {
    /// Create a new empty data model
    pub fn new() -> Self {
        Self::with_data(Value::Object(Map::new()))
    }

    /// Create a data model with initial data
    pub fn with_data(data: Value) -> Self {
        DataModel {
            data: Arc::new(data),
            pending: IndexSet::new(),
            version: 0,
        }
    }

    /// Get the current version number
    pub fn version(&self) -> u64 {
        self.version
    }

    /// A shared handle on the current document.
    pub fn snapshot(&self) -> Arc<Value> {
        Arc::clone(&self.data)
    }

    /// Get the entire data as a Value
    pub fn as_value(&self) -> &Value {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        match self.data.as_ref() {
            Value::Object(map) => map.is_empty(),
            Value::Null => true,
            _ => false,
        }
    }

    /// Get a value at the given path
    pub fn get(&self, path: &str) -> Option<&Value> {
        pointer::get(&self.data, path).ok()
    }

    /// Get a string value at the given path
    pub fn get_string(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(|v| v.as_str())
    }

    /// Get a number value at the given path
    pub fn get_number(&self, path: &str) -> Option<f64> {
        self.get(path).and_then(|v| v.as_f64())
    }

    /// Get a boolean value at the given path
    pub fn get_bool(&self, path: &str) -> Option<bool> {
        self.get(path).and_then(|v| v.as_bool())
    }

    /// Get an array value at the given path
    pub fn get_array(&self, path: &str) -> Option<&Vec<Value>> {
        self.get(path).and_then(|v| v.as_array())
    }

    /// Set a value at the given path.
    ///
    /// Tries a strict pointer assignment on a copy of the document first. If
    /// the path is refused (for example it runs through a string), the write
    /// is retried on a fresh copy with every intermediate forced to an object.
    pub fn set(&mut self, path: &str, value: Value) -> Result<()> {
        let mut next = Value::clone(&self.data);

        if let Err(err) = pointer::set(&mut next, path, value.clone()) {
            ::log::debug!("[A2UI data] strict set of {} failed ({}), forcing", path, err);
            next = Value::clone(&self.data);
            pointer::set_forced(&mut next, path, value)?;
        }

        self.data = Arc::new(next);
        self.version += 1;
        Ok(())
    }

    /// Write a value on behalf of a local input and remember it as pending.
    pub fn set_local(&mut self, path: &str, value: Value) -> Result<()> {
        self.set(path, value)?;
        self.pending.insert(path.to_string());
        Ok(())
    }

    /// Merge a `dataModelUpdate` payload at the top level.
    ///
    /// Later values for the same top-level key replace earlier ones entirely.
    /// Pending local paths under any of the updated keys count as confirmed.
    /// Returns the top-level paths that changed.
    pub fn merge(&mut self, update: &Map<String, Value>) -> Vec<String> {
        let mut next = Value::clone(&self.data);
        if !next.is_object() {
            next = Value::Object(Map::new());
        }

        let mut updated = Vec::with_capacity(update.len());
        if let Value::Object(map) = &mut next {
            for (key, value) in update {
                map.insert(key.clone(), value.clone());
                updated.push(pointer::push("/", key));
            }
        }

        self.pending
            .retain(|path| !updated.iter().any(|top| covers(top, path)));

        self.data = Arc::new(next);
        self.version += 1;
        updated
    }

    /// Drop all data and pending writes
    pub fn clear(&mut self) {
        self.data = Arc::new(Value::Object(Map::new()));
        self.pending.clear();
        self.version += 1;
    }

    /// Whether a local write to `path` awaits server confirmation
    pub fn is_pending(&self, path: &str) -> bool {
        self.pending.contains(path)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_paths(&self) -> impl Iterator<Item = &str> {
        self.pending.iter().map(String::as_str)
    }
}

/// True when `path` equals `prefix` or lies below it.
fn covers(prefix: &str, path: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}
