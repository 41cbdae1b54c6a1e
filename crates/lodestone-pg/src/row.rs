//! Flat storage row representation
//!
//! The wire format between the record mapper and the database client: a
//! name→value bag keyed by storage (not application) column names, with
//! vector values already in the driver's native vector type. Rows are
//! transient, one per operation.

use std::collections::HashMap;

use lodestone_core::Value;
use pgvector::Vector;

/// A single storage-side value
#[derive(Debug, Clone, PartialEq)]
pub enum StorageValue {
    /// A key or data value
    Scalar(Value),
    /// A vector column value; `None` is a storage NULL
    Vector(Option<Vector>),
}

/// A flat name→value bag using storage column names
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StorageRow {
    values: HashMap<String, StorageValue>,
}

impl StorageRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, storage_name: impl Into<String>, value: StorageValue) {
        self.values.insert(storage_name.into(), value);
    }

    pub fn get(&self, storage_name: &str) -> Option<&StorageValue> {
        self.values.get(storage_name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over `(storage_name, value)` pairs in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &StorageValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}
