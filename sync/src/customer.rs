//! Customer domain types.

use crate::CustomerId;
use serde::{Deserialize, Serialize};

/// A customer record as stored and shipped over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    /// Unique identifier, assigned by the coordinator at creation time
    pub id: CustomerId,
    /// Display name
    pub name: String,
    /// Contact email, unique across all customers
    pub email: String,
    /// Optional contact phone
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Input shape for creating a customer; the id is assigned later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCustomer {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl NewCustomer {
    /// Create an input record without a phone number.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            phone: None,
        }
    }

    /// Builder-style method to set the phone number.
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    /// Promote to a full record with the assigned identifier.
    pub fn into_customer(self, id: CustomerId) -> Customer {
        Customer {
            id,
            name: self.name,
            email: self.email,
            phone: self.phone,
        }
    }
}
