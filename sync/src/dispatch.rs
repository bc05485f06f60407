//! Network dispatch seam.
//!
//! The coordinator never talks to a server directly; it hands each change
//! to a [`ChangeDispatcher`]. The shipped [`LogDispatcher`] only logs the
//! would-be API call, which is the production stand-in until a real client
//! is wired up. Tests substitute recording or failing dispatchers.

use crate::PendingChange;
use async_trait::async_trait;
use thiserror::Error;

/// Failure to deliver a change to the network layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("network unavailable: {0}")]
    Unavailable(String),

    #[error("rejected by server: {0}")]
    Rejected(String),
}

/// Destination for replayed and live-forwarded changes.
#[async_trait]
pub trait ChangeDispatcher: Send + Sync {
    /// Deliver one change. The outcome feeds the configured retry policy;
    /// implementations should not retry internally.
    async fn dispatch(&self, change: &PendingChange) -> Result<(), DispatchError>;
}

/// Dispatcher that logs every change and reports success.
#[derive(Debug, Default)]
pub struct LogDispatcher;

#[async_trait]
impl ChangeDispatcher for LogDispatcher {
    async fn dispatch(&self, change: &PendingChange) -> Result<(), DispatchError> {
        tracing::info!(
            op = change.op_name(),
            customer_id = change.customer_id(),
            timestamp = change.timestamp,
            "dispatching change"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NewCustomer;

    #[tokio::test]
    async fn log_dispatcher_accepts_everything() {
        let dispatcher = LogDispatcher;
        let change = PendingChange::add(
            NewCustomer::new("Alice", "alice@example.com").into_customer(1),
            1,
        );
        assert!(dispatcher.dispatch(&change).await.is_ok());

        let change = PendingChange::delete(1, 2);
        assert!(dispatcher.dispatch(&change).await.is_ok());
    }
}
