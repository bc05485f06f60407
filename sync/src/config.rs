//! Configuration for the sync coordinator.

use satchel_store::SchemaVersion;
use std::path::PathBuf;

/// What to do with a pending change whose dispatch failed during replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryPolicy {
    /// Delete the change regardless of dispatch outcome. Failed changes are
    /// lost; a sync pass always drains the queue.
    #[default]
    Discard,
    /// Keep the change in the queue so the next sync pass tries again.
    RetainOnFailure,
}

/// Coordinator configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Directory the database image lives in
    pub data_dir: PathBuf,
    /// Local database name
    pub database_name: String,
    /// Local database schema version
    pub database_version: SchemaVersion,
    /// Replay policy for failed dispatches
    pub retry: RetryPolicy,
}

impl SyncConfig {
    /// Configuration with the default database name and version.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            database_name: "CustomerDB".to_string(),
            database_version: 1,
            retry: RetryPolicy::default(),
        }
    }

    /// Builder-style method to override the database name and version.
    pub fn with_database(mut self, name: impl Into<String>, version: SchemaVersion) -> Self {
        self.database_name = name.into();
        self.database_version = version;
        self
    }

    /// Builder-style method to set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
