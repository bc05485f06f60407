//! # Satchel Sync
//!
//! Offline-first coordination for customer records over
//! [`satchel-store`](satchel_store).
//!
//! The [`SyncCoordinator`] presents a record-oriented CRUD surface, tracks
//! connectivity through an injected [`ConnectivityEvents`] signal, queues
//! mutations made while offline as [`PendingChange`] envelopes, and replays
//! them through a [`ChangeDispatcher`] once connectivity returns.
//!
//! ## Quick Start
//!
//! ```no_run
//! use satchel_sync::{
//!     connectivity, LogDispatcher, NewCustomer, SyncConfig, SyncCoordinator,
//! };
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> satchel_sync::Result<()> {
//! let (source, events) = connectivity(false);
//! let coordinator = SyncCoordinator::new(
//!     SyncConfig::new("./data"),
//!     Arc::new(LogDispatcher),
//!     events,
//! );
//!
//! // Offline: persisted locally and queued for later delivery.
//! coordinator
//!     .add_customer(NewCustomer::new("Alice", "alice@example.com"))
//!     .await?;
//!
//! // Back online: the queue is replayed.
//! source.set_online(true);
//! let outcome = coordinator.sync_pending_changes().await?;
//! assert_eq!(outcome.delivered, 1);
//! # Ok(())
//! # }
//! ```

pub mod change;
pub mod clock;
pub mod config;
pub mod connectivity;
pub mod coordinator;
pub mod customer;
pub mod dispatch;
pub mod error;

// Re-export main types at crate root
pub use change::{ChangeOp, CustomerRef, PendingChange};
pub use clock::ChangeClock;
pub use config::{RetryPolicy, SyncConfig};
pub use connectivity::{connectivity, ConnectivityEvents, ConnectivitySource};
pub use coordinator::{SyncCoordinator, SyncOutcome, CUSTOMERS, PENDING_SYNC};
pub use customer::{Customer, NewCustomer};
pub use dispatch::{ChangeDispatcher, DispatchError, LogDispatcher};
pub use error::{Result, SyncError};

/// Type aliases for clarity
pub type CustomerId = u64;
pub type Timestamp = u64;
