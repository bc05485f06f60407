//! Pending change envelopes.
//!
//! Mutations made while offline are queued as pending changes and replayed
//! once connectivity returns. The wire shape is
//! `{"type": ..., "data": ..., "timestamp": ...}`.

use crate::{Customer, CustomerId, Timestamp};
use serde::{Deserialize, Serialize};

/// Reference to a customer by identifier, the payload of a delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRef {
    pub id: CustomerId,
}

/// The operation a pending change defers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ChangeOp {
    /// A customer was created; carries the full record.
    AddCustomer(Customer),
    /// A customer was removed; carries only the identifier.
    DeleteCustomer(CustomerRef),
}

/// A queued mutation awaiting delivery to the network layer.
///
/// The timestamp doubles as the primary key in the pending collection, so
/// it must be unique; the coordinator's clock guarantees that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChange {
    #[serde(flatten)]
    pub op: ChangeOp,
    pub timestamp: Timestamp,
}

impl PendingChange {
    /// Envelope for a deferred customer creation.
    pub fn add(customer: Customer, timestamp: Timestamp) -> Self {
        Self {
            op: ChangeOp::AddCustomer(customer),
            timestamp,
        }
    }

    /// Envelope for a deferred customer deletion.
    pub fn delete(id: CustomerId, timestamp: Timestamp) -> Self {
        Self {
            op: ChangeOp::DeleteCustomer(CustomerRef { id }),
            timestamp,
        }
    }

    /// The operation tag as it appears on the wire.
    pub fn op_name(&self) -> &'static str {
        match &self.op {
            ChangeOp::AddCustomer(_) => "addCustomer",
            ChangeOp::DeleteCustomer(_) => "deleteCustomer",
        }
    }

    /// The customer this change targets.
    pub fn customer_id(&self) -> CustomerId {
        match &self.op {
            ChangeOp::AddCustomer(customer) => customer.id,
            ChangeOp::DeleteCustomer(target) => target.id,
        }
    }
}
