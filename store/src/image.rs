//! On-disk database image.
//!
//! The image is the bridge between the in-memory database and the file on
//! disk. It uses `BTreeMap` throughout so serialization is deterministic
//! and iteration is key-ordered.

use crate::{error::Result, CollectionName, Error, Key, SchemaVersion};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Version of the image format for future compatibility.
pub const IMAGE_FORMAT_VERSION: u32 = 1;

/// The whole database as serialized to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseImage {
    /// Image format version
    pub format_version: u32,
    /// Database name
    pub name: String,
    /// Database schema version
    pub version: SchemaVersion,
    /// Items organized by collection, then by primary key
    pub collections: BTreeMap<CollectionName, BTreeMap<Key, serde_json::Value>>,
}

impl DatabaseImage {
    /// Create an empty image.
    pub fn new(name: impl Into<String>, version: SchemaVersion) -> Self {
        Self {
            format_version: IMAGE_FORMAT_VERSION,
            name: name.into(),
            version,
            collections: BTreeMap::new(),
        }
    }

    /// Create an empty collection if it does not exist yet.
    pub fn create_collection(&mut self, name: impl Into<CollectionName>) {
        self.collections.entry(name.into()).or_default();
    }

    /// Check whether a collection exists.
    pub fn has_collection(&self, name: &str) -> bool {
        self.collections.contains_key(name)
    }

    /// Get the items of a collection.
    pub fn collection(&self, name: &str) -> Option<&BTreeMap<Key, serde_json::Value>> {
        self.collections.get(name)
    }

    /// Get the items of a collection mutably.
    pub fn collection_mut(&mut self, name: &str) -> Option<&mut BTreeMap<Key, serde_json::Value>> {
        self.collections.get_mut(name)
    }

    /// Count items across all collections.
    pub fn item_count(&self) -> usize {
        self.collections.values().map(|c| c.len()).sum()
    }

    /// Serialize to JSON with deterministic ordering.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Database(format!("failed to encode image: {e}")))
    }

    /// Deserialize from JSON, rejecting images from a newer format.
    pub fn from_json(json: &str) -> Result<Self> {
        let image: Self = serde_json::from_str(json)
            .map_err(|e| Error::Database(format!("failed to decode image: {e}")))?;

        if image.format_version > IMAGE_FORMAT_VERSION {
            return Err(Error::Database(format!(
                "unsupported image format version: {} (max supported: {})",
                image.format_version, IMAGE_FORMAT_VERSION
            )));
        }

        Ok(image)
    }
}
