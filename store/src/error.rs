//! Error types for the storage layer.

use crate::{CollectionName, IndexName};
use thiserror::Error;

/// All possible errors from the storage layer.
///
/// Absent reads return empty results and absent deletes are no-ops; there
/// is no "not found" error for items.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Open errors
    #[error("database error: {0}")]
    Database(String),

    // Operation errors
    #[error("database not initialized")]
    NotInitialized,

    #[error("collection not found: {0}")]
    CollectionNotFound(CollectionName),

    #[error("index not found: {0}")]
    IndexNotFound(IndexName),

    #[error("constraint violation in '{collection}': {reason}")]
    Constraint {
        collection: CollectionName,
        reason: String,
    },

    #[error("invalid item: {0}")]
    InvalidItem(String),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::NotInitialized;
        assert_eq!(err.to_string(), "database not initialized");

        let err = Error::CollectionNotFound("customers".into());
        assert_eq!(err.to_string(), "collection not found: customers");

        let err = Error::Constraint {
            collection: "customers".into(),
            reason: "key 1 already exists".into(),
        };
        assert_eq!(
            err.to_string(),
            "constraint violation in 'customers': key 1 already exists"
        );
    }
}
