//! Sync coordinator - CRUD over the store plus the offline queue.
//!
//! The coordinator owns the local database, an in-memory customer cache,
//! and the pending-change queue. Mutations made while offline are queued;
//! when connectivity returns they are replayed through the configured
//! dispatcher in timestamp order.

use crate::{
    change::PendingChange,
    clock::ChangeClock,
    config::{RetryPolicy, SyncConfig},
    connectivity::ConnectivityEvents,
    customer::{Customer, NewCustomer},
    dispatch::ChangeDispatcher,
    error::{Result, SyncError},
    CustomerId,
};
use satchel_store::{CollectionSchema, Database, IndexDef};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};

/// Collection holding customer records.
pub const CUSTOMERS: &str = "customers";
/// Collection holding queued offline mutations, keyed by timestamp.
pub const PENDING_SYNC: &str = "pendingSync";

/// Tally of one replay pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Changes whose dispatch succeeded; removed from the queue
    pub delivered: usize,
    /// Changes whose dispatch failed and were removed anyway ([`RetryPolicy::Discard`])
    pub dropped: usize,
    /// Changes whose dispatch failed and stayed queued ([`RetryPolicy::RetainOnFailure`])
    pub retained: usize,
}

impl SyncOutcome {
    /// Total changes the pass looked at.
    pub fn processed(&self) -> usize {
        self.delivered + self.dropped + self.retained
    }
}

/// Coordinates local persistence, the offline queue, and replay.
pub struct SyncCoordinator {
    config: SyncConfig,
    db: Database,
    init: OnceCell<()>,
    clock: ChangeClock,
    dispatcher: Arc<dyn ChangeDispatcher>,
    connectivity: ConnectivityEvents,
    customers: RwLock<Vec<Customer>>,
    active_ops: AtomicUsize,
}

impl SyncCoordinator {
    /// Create a coordinator. No IO happens until the first operation (or an
    /// explicit [`initialize`](Self::initialize)) opens the database.
    pub fn new(
        config: SyncConfig,
        dispatcher: Arc<dyn ChangeDispatcher>,
        connectivity: ConnectivityEvents,
    ) -> Self {
        let db = Database::new(
            &config.data_dir,
            &config.database_name,
            config.database_version,
        );
        Self {
            config,
            db,
            init: OnceCell::new(),
            clock: ChangeClock::new(),
            dispatcher,
            connectivity,
            customers: RwLock::new(Vec::new()),
            active_ops: AtomicUsize::new(0),
        }
    }

    fn schemas() -> Vec<CollectionSchema> {
        vec![
            CollectionSchema::new(CUSTOMERS, "id")
                .with_index(IndexDef::non_unique("name", "name"))
                .with_index(IndexDef::unique("email", "email")),
            CollectionSchema::new(PENDING_SYNC, "timestamp"),
        ]
    }

    /// Open the database with the two-collection schema.
    ///
    /// Idempotent; concurrent callers await the same in-flight open, and a
    /// failed open leaves the coordinator uninitialized so a later call can
    /// retry. Every mutating operation invokes this lazily.
    pub async fn initialize(&self) -> Result<()> {
        let _op = self.op_guard();
        self.init
            .get_or_try_init(|| async {
                tracing::debug!(
                    name = %self.config.database_name,
                    version = self.config.database_version,
                    "opening local database"
                );
                self.db.open(Self::schemas()).await?;
                Ok::<(), SyncError>(())
            })
            .await?;
        Ok(())
    }

    /// Assign an id, persist the customer, and cache it.
    ///
    /// Offline, the mutation is queued with the new id as the change
    /// timestamp; online it is forwarded to the dispatcher fire-and-forget.
    pub async fn add_customer(&self, new: NewCustomer) -> Result<Customer> {
        let _op = self.op_guard();
        self.initialize().await?;

        let id = self.clock.next();
        let customer = new.into_customer(id);
        self.db.add(CUSTOMERS, encode(&customer)?).await?;
        self.customers.write().await.push(customer.clone());

        let change = PendingChange::add(customer.clone(), id);
        if self.is_online() {
            self.forward(&change).await;
        } else {
            self.db.add(PENDING_SYNC, encode(&change)?).await?;
            tracing::debug!(customer_id = id, "queued addCustomer while offline");
        }
        Ok(customer)
    }

    /// Remove a customer from storage and the cache. Unknown ids are a
    /// no-op, matching the store's delete semantics.
    pub async fn delete_customer(&self, id: CustomerId) -> Result<()> {
        let _op = self.op_guard();
        self.initialize().await?;

        self.db.delete(CUSTOMERS, id).await?;
        self.customers.write().await.retain(|c| c.id != id);

        let change = PendingChange::delete(id, self.clock.next());
        if self.is_online() {
            self.forward(&change).await;
        } else {
            self.db.add(PENDING_SYNC, encode(&change)?).await?;
            tracing::debug!(customer_id = id, "queued deleteCustomer while offline");
        }
        Ok(())
    }

    /// Replace the cache with the full contents of the customer collection.
    pub async fn load_customers(&self) -> Result<Vec<Customer>> {
        let _op = self.op_guard();
        self.initialize().await?;
        self.reload_cache().await
    }

    /// Replay the pending queue through the dispatcher.
    ///
    /// A no-op while offline or before initialization. Changes are
    /// processed in timestamp order; what happens to a change whose
    /// dispatch fails is decided by the configured [`RetryPolicy`]. The
    /// cache is reloaded afterwards.
    pub async fn sync_pending_changes(&self) -> Result<SyncOutcome> {
        let _op = self.op_guard();
        if !self.is_online() || self.init.get().is_none() {
            return Ok(SyncOutcome::default());
        }

        let mut outcome = SyncOutcome::default();
        for value in self.db.get_all(PENDING_SYNC).await? {
            let change: PendingChange = decode(value)?;
            match self.dispatcher.dispatch(&change).await {
                Ok(()) => {
                    self.db.delete(PENDING_SYNC, change.timestamp).await?;
                    outcome.delivered += 1;
                }
                Err(err) => match self.config.retry {
                    RetryPolicy::Discard => {
                        tracing::warn!(
                            %err,
                            op = change.op_name(),
                            timestamp = change.timestamp,
                            "dispatch failed, dropping change"
                        );
                        self.db.delete(PENDING_SYNC, change.timestamp).await?;
                        outcome.dropped += 1;
                    }
                    RetryPolicy::RetainOnFailure => {
                        tracing::warn!(
                            %err,
                            op = change.op_name(),
                            timestamp = change.timestamp,
                            "dispatch failed, retaining change"
                        );
                        outcome.retained += 1;
                    }
                },
            }
        }

        self.reload_cache().await?;
        tracing::info!(
            delivered = outcome.delivered,
            dropped = outcome.dropped,
            retained = outcome.retained,
            "sync pass finished"
        );
        Ok(outcome)
    }

    /// The queued changes, in replay order.
    pub async fn pending_changes(&self) -> Result<Vec<PendingChange>> {
        let _op = self.op_guard();
        self.initialize().await?;
        self.db
            .get_all(PENDING_SYNC)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    /// React to connectivity transitions until the source is dropped.
    ///
    /// Going online triggers a replay; going offline only records the flag,
    /// which [`is_online`](Self::is_online) reflects immediately. The source
    /// only publishes real toggles, so every online event is a reconnect; a
    /// transition that happened before this loop started is caught by the
    /// initial replay.
    pub async fn run(&self) {
        let mut events = self.connectivity.clone();
        if self.is_online() {
            if let Err(err) = self.sync_pending_changes().await {
                tracing::warn!(%err, "initial replay failed");
            }
        }
        while let Some(now_online) = events.changed().await {
            if now_online {
                tracing::info!("connectivity restored, replaying pending changes");
                if let Err(err) = self.sync_pending_changes().await {
                    tracing::warn!(%err, "replay after reconnect failed");
                }
            }
        }
    }

    /// Snapshot of the in-memory customer cache.
    pub async fn customers(&self) -> Vec<Customer> {
        self.customers.read().await.clone()
    }

    /// Current connectivity state.
    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    /// Whether any operation is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.active_ops.load(Ordering::Acquire) > 0
    }

    async fn reload_cache(&self) -> Result<Vec<Customer>> {
        let customers = self
            .db
            .get_all(CUSTOMERS)
            .await?
            .into_iter()
            .map(decode)
            .collect::<Result<Vec<Customer>>>()?;
        *self.customers.write().await = customers.clone();
        Ok(customers)
    }

    /// Live forwarding of a mutation made while online. Failures are logged
    /// and swallowed; the mutation is already persisted locally.
    async fn forward(&self, change: &PendingChange) {
        if let Err(err) = self.dispatcher.dispatch(change).await {
            tracing::warn!(%err, op = change.op_name(), "live dispatch failed");
        }
    }

    fn op_guard(&self) -> OpGuard<'_> {
        self.active_ops.fetch_add(1, Ordering::AcqRel);
        OpGuard(&self.active_ops)
    }
}

struct OpGuard<'a>(&'a AtomicUsize);

impl Drop for OpGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

fn encode<T: Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| SyncError::Corrupt(e.to_string()))
}

fn decode<T: DeserializeOwned>(value: serde_json::Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| SyncError::Corrupt(e.to_string()))
}
