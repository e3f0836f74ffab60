// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to the document store.
//!
//! Each repository borrows the [`Database`](super::Database) and converts
//! between domain records and stored documents.

pub mod donations;
pub mod users;

pub use donations::DonationRepository;
pub use users::UserRepository;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use super::{Document, StoreError, StoreResult};

/// Serialize a record into a stored document.
pub(crate) fn to_document<T: Serialize>(record: &T) -> StoreResult<Document> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::InvalidDocument(format!(
            "record serialized to non-object {other}"
        ))),
    }
}

/// Deserialize a stored document into a record.
pub(crate) fn from_document<T: DeserializeOwned>(document: Document) -> StoreResult<T> {
    Ok(serde_json::from_value(Value::Object(document))?)
}
