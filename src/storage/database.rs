// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Async facade over a [`DocumentStore`].
//!
//! Backends are synchronous. Each call is moved to the blocking pool and
//! raced against a timeout; on expiry the caller gets
//! [`StoreError::Timeout`] and the blocking task is left to finish on its
//! own. Nothing is retried.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use super::{
    Document, DocumentStore, Filter, MemoryStore, Pipeline, StoreError, StoreResult, Update,
};
use crate::config::DEFAULT_STORE_TIMEOUT;

/// Shared, cloneable handle to the document store.
#[derive(Clone)]
pub struct Database {
    store: Arc<dyn DocumentStore>,
    timeout: Duration,
}

impl Database {
    pub fn new(store: Arc<dyn DocumentStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Empty in-memory database with the default timeout.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::default()), DEFAULT_STORE_TIMEOUT)
    }

    async fn run<T, F>(&self, operation: &'static str, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn DocumentStore) -> StoreResult<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let task = tokio::task::spawn_blocking(move || f(store.as_ref()));

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(StoreError::Task(join_error.to_string())),
            Err(_) => {
                warn!(operation, timeout_ms = self.timeout.as_millis() as u64, "Store operation timed out");
                Err(StoreError::Timeout {
                    operation,
                    timeout: self.timeout,
                })
            }
        }
    }

    pub async fn find_one(
        &self,
        collection: &'static str,
        filter: Filter,
    ) -> StoreResult<Option<Document>> {
        self.run("find_one", move |store| store.find_one(collection, &filter))
            .await
    }

    pub async fn insert_one(
        &self,
        collection: &'static str,
        document: Document,
    ) -> StoreResult<String> {
        self.run("insert_one", move |store| {
            store.insert_one(collection, document)
        })
        .await
    }

    pub async fn update_by_id(
        &self,
        collection: &'static str,
        id: String,
        update: Update,
    ) -> StoreResult<()> {
        self.run("update_by_id", move |store| {
            store.update_by_id(collection, &id, &update)
        })
        .await
    }

    pub async fn aggregate(
        &self,
        collection: &'static str,
        pipeline: Pipeline,
    ) -> StoreResult<Vec<Document>> {
        self.run("aggregate", move |store| {
            store.aggregate(collection, &pipeline)
        })
        .await
    }

    pub async fn ping(&self) -> StoreResult<()> {
        self.run("ping", |store| store.ping()).await
    }
}
