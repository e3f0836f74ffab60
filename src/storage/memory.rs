// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory document store.
//!
//! Used by tests and by `STORE_BACKEND=memory` for local development.
//! Contents are lost when the process exits.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::query::{field, index_key};
use super::{
    document_id, CollectionSpec, Document, DocumentStore, Filter, StoreError, StoreResult,
    Update, ID_FIELD,
};

struct Collection {
    unique_fields: &'static [&'static str],
    docs: HashMap<String, Document>,
    /// field → (value key → document id)
    indexes: HashMap<&'static str, HashMap<String, String>>,
}

impl Collection {
    fn new(spec: &CollectionSpec) -> Self {
        Self {
            unique_fields: spec.unique,
            docs: HashMap::new(),
            indexes: spec
                .unique
                .iter()
                .map(|name| (*name, HashMap::new()))
                .collect(),
        }
    }

    /// Fail if `doc` would collide with another document on a unique field.
    fn check_unique(&self, id: &str, doc: &Document) -> StoreResult<()> {
        for name in self.unique_fields {
            let Some(key) = unique_key(doc, name) else {
                continue;
            };
            let owner = self.indexes.get(name).and_then(|index| index.get(&key));
            if owner.is_some_and(|owner| owner != id) {
                return Err(StoreError::Duplicate {
                    field: name.to_string(),
                });
            }
        }
        Ok(())
    }

    fn reindex(&mut self, id: &str, old: Option<&Document>, new: &Document) {
        for name in self.unique_fields {
            let index = self.indexes.entry(*name).or_default();
            if let Some(old_key) = old.and_then(|doc| unique_key(doc, name)) {
                index.remove(&old_key);
            }
            if let Some(new_key) = unique_key(new, name) {
                index.insert(new_key, id.to_string());
            }
        }
    }
}

fn unique_key(doc: &Document, name: &str) -> Option<String> {
    field(doc, name)
        .filter(|value| !value.is_null())
        .map(index_key)
}

/// Document store kept entirely in process memory.
pub struct MemoryStore {
    collections: RwLock<HashMap<&'static str, Collection>>,
}

impl MemoryStore {
    /// Create an empty store with the given collections.
    pub fn new(specs: &[CollectionSpec]) -> Self {
        Self {
            collections: RwLock::new(
                specs
                    .iter()
                    .map(|spec| (spec.name, Collection::new(spec)))
                    .collect(),
            ),
        }
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, HashMap<&'static str, Collection>>> {
        self.collections.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, HashMap<&'static str, Collection>>> {
        self.collections.write().map_err(|_| StoreError::Poisoned)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(super::COLLECTIONS)
    }
}

impl DocumentStore for MemoryStore {
    fn scan(&self, collection: &str) -> StoreResult<Vec<Document>> {
        let collections = self.read()?;
        let coll = collections
            .get(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;
        Ok(coll.docs.values().cloned().collect())
    }

    fn select(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>> {
        let collections = self.read()?;
        let coll = collections
            .get(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;

        // Only matching documents are cloned.
        let docs = match filter.values_on(ID_FIELD) {
            Some(ids) => {
                let mut keys: Vec<String> = ids.into_iter().map(index_key).collect();
                keys.sort();
                keys.dedup();
                keys.iter()
                    .filter_map(|id| coll.docs.get(id))
                    .filter(|doc| filter.matches(doc))
                    .cloned()
                    .collect()
            }
            None => coll
                .docs
                .values()
                .filter(|doc| filter.matches(doc))
                .cloned()
                .collect(),
        };
        Ok(docs)
    }

    fn insert_one(&self, collection: &str, document: Document) -> StoreResult<String> {
        let id = document_id(&document)?;
        let mut collections = self.write()?;
        let coll = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;

        if coll.docs.contains_key(&id) {
            return Err(StoreError::Duplicate {
                field: ID_FIELD.to_string(),
            });
        }
        coll.check_unique(&id, &document)?;
        coll.reindex(&id, None, &document);
        coll.docs.insert(id.clone(), document);
        Ok(id)
    }

    fn update_by_id(&self, collection: &str, id: &str, update: &Update) -> StoreResult<()> {
        let mut collections = self.write()?;
        let coll = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;

        let old = coll
            .docs
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("{collection}/{id}")))?;
        let mut next = old.clone();
        update.apply(&mut next)?;

        coll.check_unique(id, &next)?;
        coll.reindex(id, Some(&old), &next);
        coll.docs.insert(id.to_string(), next);
        Ok(())
    }

    fn ping(&self) -> StoreResult<()> {
        self.read().map(|_| ())
    }
}
