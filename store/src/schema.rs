//! Collection schema descriptors.
//!
//! Schemas describe collections and their secondary indexes. They are
//! supplied once at open time and only consulted when a collection is
//! first created, never mutated afterward.

use crate::{error::Result, CollectionName, Error, IndexName, Key};
use serde::{Deserialize, Serialize};

/// A secondary index over one field of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDef {
    /// Index name
    pub name: IndexName,
    /// Field the index is built over
    pub key_path: String,
    /// Whether indexed values must be unique within the collection
    pub unique: bool,
}

impl IndexDef {
    /// Create a unique index definition.
    pub fn unique(name: impl Into<IndexName>, key_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_path: key_path.into(),
            unique: true,
        }
    }

    /// Create a non-unique index definition.
    pub fn non_unique(name: impl Into<IndexName>, key_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_path: key_path.into(),
            unique: false,
        }
    }
}

/// Schema for a collection: its name, primary key field, and indexes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSchema {
    /// Collection name
    pub name: CollectionName,
    /// Field holding the primary key
    pub key_path: String,
    /// Secondary index definitions
    pub indexes: Vec<IndexDef>,
}

impl CollectionSchema {
    /// Create a schema with no secondary indexes.
    pub fn new(name: impl Into<CollectionName>, key_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_path: key_path.into(),
            indexes: Vec::new(),
        }
    }

    /// Builder-style method to add a secondary index.
    pub fn with_index(mut self, index: IndexDef) -> Self {
        self.indexes.push(index);
        self
    }

    /// Extract the primary key from an item.
    pub fn extract_key(&self, item: &serde_json::Value) -> Result<Key> {
        let obj = item
            .as_object()
            .ok_or_else(|| Error::InvalidItem("item must be an object".into()))?;

        obj.get(&self.key_path).and_then(|v| v.as_u64()).ok_or_else(|| {
            Error::InvalidItem(format!(
                "missing or non-integer key field '{}'",
                self.key_path
            ))
        })
    }
}
