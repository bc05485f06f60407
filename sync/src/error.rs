//! Unified error handling for the sync layer.

use thiserror::Error;

/// Sync coordinator error type.
///
/// Dispatch failures are deliberately not represented here; whether a failed
/// dispatch matters is decided by the configured
/// [`RetryPolicy`](crate::RetryPolicy), not by the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("storage error: {0}")]
    Storage(#[from] satchel_store::Error),

    #[error("corrupt stored item: {0}")]
    Corrupt(String),
}

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
