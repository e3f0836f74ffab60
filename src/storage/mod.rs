// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Document Storage Module
//!
//! Persistence for users and donations behind a small document-store
//! capability set ([`DocumentStore`]): find one, insert one, update by id
//! with `set`/`inc` fields, and aggregate through a typed [`Pipeline`].
//!
//! ## Layers
//!
//! - [`DocumentStore`] - synchronous, object-safe backend trait
//!   - [`RedbStore`] - embedded ACID file store (production)
//!   - [`MemoryStore`] - process-local maps (tests, `STORE_BACKEND=memory`)
//! - [`Database`] - async facade used by request handlers; every call runs on
//!   the blocking pool and is bounded by a timeout
//! - [`repository`] - typed access to the `users` and `donations` collections
//!
//! ## Collections
//!
//! ```text
//! users       id → User        unique: email, username
//! donations   id → Donation    indexed: to_user_id
//! ```
//!
//! Unique fields are enforced by the backend inside the same write that
//! inserts the document, so concurrent registrations cannot both succeed.
//! Indexed fields map a value to every document id carrying it; filters
//! pinning the id, a unique field or an indexed field read only the
//! matching documents.

pub mod database;
pub mod memory;
pub mod query;
pub mod redb_store;
pub mod repository;

pub use database::Database;
pub use memory::MemoryStore;
pub use query::{Document, Filter, Pipeline, SortOrder, Update, ID_FIELD};
pub use redb_store::RedbStore;
pub use repository::{DonationRepository, UserRepository};

use std::time::Duration;

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate value for unique field {field}")]
    Duplicate { field: String },

    #[error("invalid update: {0}")]
    InvalidUpdate(String),

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    #[error("store operation {operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("store task failed: {0}")]
    Task(String),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),
}

pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Collections
// =============================================================================

/// Static description of a collection and its indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionSpec {
    pub name: &'static str,
    /// Fields whose values are unique across the collection.
    pub unique: &'static [&'static str],
    /// Non-unique fields with a value → ids index.
    pub indexed: &'static [&'static str],
}

pub const USERS: &str = "users";
pub const DONATIONS: &str = "donations";

/// Collections used by the service.
pub const COLLECTIONS: &[CollectionSpec] = &[
    CollectionSpec {
        name: USERS,
        unique: &["email", "username"],
        indexed: &[],
    },
    CollectionSpec {
        name: DONATIONS,
        unique: &[],
        indexed: &["to_user_id"],
    },
];

// =============================================================================
// Backend Trait
// =============================================================================

/// Document store backend.
///
/// Implementations must make each call atomic with respect to the
/// documents it touches; in particular `update_by_id` with `inc` fields is
/// a single read-modify-write.
pub trait DocumentStore: Send + Sync {
    /// All documents in a collection, in unspecified order.
    fn scan(&self, collection: &str) -> StoreResult<Vec<Document>>;

    /// Insert a document carrying a string `id`; returns that id.
    fn insert_one(&self, collection: &str, document: Document) -> StoreResult<String>;

    /// Apply `update` to the document with the given id.
    ///
    /// Fails with [`StoreError::NotFound`] if no such document exists.
    fn update_by_id(&self, collection: &str, id: &str, update: &Update) -> StoreResult<()>;

    /// Cheap liveness check.
    fn ping(&self) -> StoreResult<()>;

    /// All documents matching `filter`, in unspecified order.
    ///
    /// Backends with indexes override this to avoid reading documents the
    /// filter cannot match.
    fn select(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>> {
        let mut docs = self.scan(collection)?;
        docs.retain(|doc| filter.matches(doc));
        Ok(docs)
    }

    /// First document matching `filter`.
    fn find_one(&self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>> {
        Ok(self.select(collection, filter)?.into_iter().next())
    }

    /// Run an aggregation pipeline over a collection.
    ///
    /// A leading match stage selects the input; lookups read only the
    /// foreign documents the input references.
    fn aggregate(&self, collection: &str, pipeline: &Pipeline) -> StoreResult<Vec<Document>> {
        let docs = match pipeline.leading_filter() {
            Some(filter) => self.select(collection, filter)?,
            None => self.scan(collection)?,
        };
        pipeline.run(docs, |from, wanted| self.select(from, wanted))
    }
}

/// Extract the mandatory string id from a document.
pub(crate) fn document_id(document: &Document) -> StoreResult<String> {
    document
        .get(ID_FIELD)
        .and_then(|value| value.as_str())
        .map(str::to_string)
        .ok_or_else(|| StoreError::InvalidDocument("document has no string id".to_string()))
}
