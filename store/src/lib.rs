//! # Satchel Store
//!
//! A versioned, file-backed collection store for local-first applications.
//!
//! The store is collection-agnostic: items are JSON objects, and a
//! [`CollectionSchema`] tells the store which field holds the primary key
//! and which fields carry secondary indexes. Schemas are supplied at open
//! time and applied only when a collection is first created (or when the
//! database version is bumped).
//!
//! ## Core Concepts
//!
//! ### Collections
//!
//! A collection is a named group of items addressed by a `u64` primary key
//! extracted from each item. Iteration is key-ordered.
//!
//! ### Secondary Indexes
//!
//! Each collection may declare secondary indexes over single fields. A
//! unique index rejects inserts that would duplicate an indexed value.
//! Indexes are rebuilt in memory on every open.
//!
//! ### Persistence
//!
//! The whole database is a single JSON image on disk (see
//! [`DatabaseImage`]), rewritten atomically after each mutation. The image
//! uses `BTreeMap` throughout so serialization is deterministic.
//!
//! ## Quick Start
//!
//! ```no_run
//! use satchel_store::{CollectionSchema, Database, IndexDef};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> satchel_store::Result<()> {
//! let db = Database::new("./data", "CustomerDB", 1);
//! db.open(vec![
//!     CollectionSchema::new("customers", "id")
//!         .with_index(IndexDef::unique("email", "email")),
//! ])
//! .await?;
//!
//! let key = db
//!     .add("customers", json!({"id": 1, "email": "alice@example.com"}))
//!     .await?;
//! assert_eq!(key, 1);
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod error;
pub mod image;
pub mod schema;

// Re-export main types at crate root
pub use database::Database;
pub use error::{Error, Result};
pub use image::{DatabaseImage, IMAGE_FORMAT_VERSION};
pub use schema::{CollectionSchema, IndexDef};

/// Type aliases for clarity
pub type CollectionName = String;
pub type IndexName = String;
pub type Key = u64;
pub type SchemaVersion = u32;
