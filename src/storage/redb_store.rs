// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded document store backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `{collection}`: id → document (JSON bytes)
//! - `{collection}__by_{field}`: unique field value → id
//! - `{collection}__idx_{field}`: indexed field value → ids (multimap)
//!
//! Every trait call runs in exactly one redb transaction. Writes update the
//! document and its index entries in the same transaction, which is what
//! makes the uniqueness guarantee hold under concurrent inserts.
//!
//! Reads resolve a filter through the primary key or an index whenever a
//! condition pins one of them, and only deserialize the documents found
//! there. Other filters scan the collection.

use std::collections::BTreeSet;
use std::path::Path;

use redb::{
    Database, MultimapTableDefinition, ReadTransaction, ReadableDatabase, ReadableMultimapTable,
    ReadableTable, TableDefinition, WriteTransaction,
};

use super::query::{field, index_key};
use super::{
    document_id, CollectionSpec, Document, DocumentStore, Filter, Pipeline, StoreError,
    StoreResult, Update, ID_FIELD,
};

// =============================================================================
// Table Definitions
// =============================================================================

type DocTable<'a> = TableDefinition<'a, &'static str, &'static [u8]>;
type UniqueTable<'a> = TableDefinition<'a, &'static str, &'static str>;
type IndexTable<'a> = MultimapTableDefinition<'a, &'static str, &'static str>;

fn unique_table_name(collection: &str, field_name: &str) -> String {
    format!("{collection}__by_{field_name}")
}

fn index_table_name(collection: &str, field_name: &str) -> String {
    format!("{collection}__idx_{field_name}")
}

/// Index key of a field; null and missing values are not indexed.
fn indexed_key(doc: &Document, name: &str) -> Option<String> {
    field(doc, name)
        .filter(|value| !value.is_null())
        .map(index_key)
}

// =============================================================================
// RedbStore
// =============================================================================

/// Document store persisted in a single redb file.
pub struct RedbStore {
    db: Database,
    specs: Vec<CollectionSpec>,
}

impl RedbStore {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path, specs: &[CollectionSpec]) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        for spec in specs {
            let _ = write_txn.open_table(DocTable::new(spec.name))?;
            for name in spec.unique {
                let table_name = unique_table_name(spec.name, name);
                let _ = write_txn.open_table(UniqueTable::new(&table_name))?;
            }
            for name in spec.indexed {
                let table_name = index_table_name(spec.name, name);
                let _ = write_txn.open_multimap_table(IndexTable::new(&table_name))?;
            }
        }
        write_txn.commit()?;

        Ok(Self {
            db,
            specs: specs.to_vec(),
        })
    }

    fn spec(&self, collection: &str) -> StoreResult<&CollectionSpec> {
        self.specs
            .iter()
            .find(|spec| spec.name == collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))
    }

    fn scan_in(&self, txn: &ReadTransaction, collection: &str) -> StoreResult<Vec<Document>> {
        let spec = self.spec(collection)?;
        let table = txn.open_table(DocTable::new(spec.name))?;
        let mut docs = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            docs.push(serde_json::from_slice(value.value())?);
        }
        Ok(docs)
    }

    /// Documents matching `filter`, reading only index candidates when the
    /// filter pins the id or an indexed field.
    fn select_in(
        &self,
        txn: &ReadTransaction,
        collection: &str,
        filter: &Filter,
    ) -> StoreResult<Vec<Document>> {
        let spec = self.spec(collection)?;
        let mut docs: Vec<Document> = match Self::candidate_ids(txn, spec, filter)? {
            Some(ids) => {
                let table = txn.open_table(DocTable::new(spec.name))?;
                let mut docs = Vec::with_capacity(ids.len());
                for id in &ids {
                    if let Some(value) = table.get(id.as_str())? {
                        docs.push(serde_json::from_slice(value.value())?);
                    }
                }
                docs
            }
            None => self.scan_in(txn, collection)?,
        };
        docs.retain(|doc| filter.matches(doc));
        Ok(docs)
    }

    /// Ids of every document that can match `filter`, looked up through the
    /// primary key, a unique index or a value index, in that order of
    /// preference. `None` when no condition pins an indexed field.
    fn candidate_ids(
        txn: &ReadTransaction,
        spec: &CollectionSpec,
        filter: &Filter,
    ) -> StoreResult<Option<BTreeSet<String>>> {
        let pinned = |name: &str| {
            filter
                .values_on(name)
                .filter(|values| values.iter().all(|value| !value.is_null()))
        };

        if let Some(values) = pinned(ID_FIELD) {
            return Ok(Some(values.into_iter().map(index_key).collect()));
        }

        for name in spec.unique {
            if let Some(values) = pinned(*name) {
                let table_name = unique_table_name(spec.name, name);
                let index = txn.open_table(UniqueTable::new(&table_name))?;
                let mut ids = BTreeSet::new();
                for value in values {
                    if let Some(owner) = index.get(index_key(value).as_str())? {
                        ids.insert(owner.value().to_string());
                    }
                }
                return Ok(Some(ids));
            }
        }

        for name in spec.indexed {
            if let Some(values) = pinned(*name) {
                let table_name = index_table_name(spec.name, name);
                let index = txn.open_multimap_table(IndexTable::new(&table_name))?;
                let mut ids = BTreeSet::new();
                for value in values {
                    for owner in index.get(index_key(value).as_str())? {
                        ids.insert(owner?.value().to_string());
                    }
                }
                return Ok(Some(ids));
            }
        }

        Ok(None)
    }

    /// Move index entries for `id` from the values in `old` to those in
    /// `new`. Unique entries held by another id fail the write.
    fn write_indexes(
        txn: &WriteTransaction,
        spec: &CollectionSpec,
        id: &str,
        old: Option<&Document>,
        new: &Document,
    ) -> StoreResult<()> {
        for name in spec.unique {
            let old_key = old.and_then(|doc| indexed_key(doc, name));
            let new_key = indexed_key(new, name);
            if old_key == new_key {
                continue;
            }

            let table_name = unique_table_name(spec.name, name);
            let mut index = txn.open_table(UniqueTable::new(&table_name))?;

            if let Some(key) = &new_key {
                let owner = index.get(key.as_str())?.map(|v| v.value().to_string());
                if owner.is_some_and(|owner| owner != id) {
                    return Err(StoreError::Duplicate {
                        field: name.to_string(),
                    });
                }
            }
            if let Some(key) = &old_key {
                index.remove(key.as_str())?;
            }
            if let Some(key) = &new_key {
                index.insert(key.as_str(), id)?;
            }
        }

        for name in spec.indexed {
            let old_key = old.and_then(|doc| indexed_key(doc, name));
            let new_key = indexed_key(new, name);
            if old_key == new_key {
                continue;
            }

            let table_name = index_table_name(spec.name, name);
            let mut index = txn.open_multimap_table(IndexTable::new(&table_name))?;
            if let Some(key) = &old_key {
                index.remove(key.as_str(), id)?;
            }
            if let Some(key) = &new_key {
                index.insert(key.as_str(), id)?;
            }
        }
        Ok(())
    }
}

impl DocumentStore for RedbStore {
    fn scan(&self, collection: &str) -> StoreResult<Vec<Document>> {
        let read_txn = self.db.begin_read()?;
        self.scan_in(&read_txn, collection)
    }

    fn select(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>> {
        let read_txn = self.db.begin_read()?;
        self.select_in(&read_txn, collection, filter)
    }

    fn insert_one(&self, collection: &str, document: Document) -> StoreResult<String> {
        let spec = self.spec(collection)?;
        let id = document_id(&document)?;
        let json = serde_json::to_vec(&document)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(DocTable::new(spec.name))?;
            if table.get(id.as_str())?.is_some() {
                return Err(StoreError::Duplicate {
                    field: ID_FIELD.to_string(),
                });
            }
            table.insert(id.as_str(), json.as_slice())?;
        }
        Self::write_indexes(&write_txn, spec, &id, None, &document)?;
        write_txn.commit()?;
        Ok(id)
    }

    fn update_by_id(&self, collection: &str, id: &str, update: &Update) -> StoreResult<()> {
        let spec = self.spec(collection)?;

        let write_txn = self.db.begin_write()?;
        let (old, next) = {
            let mut table = write_txn.open_table(DocTable::new(spec.name))?;
            let old: Document = match table.get(id)? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => return Err(StoreError::NotFound(format!("{collection}/{id}"))),
            };
            let mut next = old.clone();
            update.apply(&mut next)?;
            let json = serde_json::to_vec(&next)?;
            table.insert(id, json.as_slice())?;
            (old, next)
        };
        Self::write_indexes(&write_txn, spec, id, Some(&old), &next)?;
        write_txn.commit()?;
        Ok(())
    }

    fn aggregate(&self, collection: &str, pipeline: &Pipeline) -> StoreResult<Vec<Document>> {
        // One snapshot for the base collection and every joined collection.
        let read_txn = self.db.begin_read()?;
        let docs = match pipeline.leading_filter() {
            Some(filter) => self.select_in(&read_txn, collection, filter)?,
            None => self.scan_in(&read_txn, collection)?,
        };
        pipeline.run(docs, |from, wanted| self.select_in(&read_txn, from, wanted))
    }

    fn ping(&self) -> StoreResult<()> {
        let _ = self.db.begin_read()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{SortOrder, COLLECTIONS, DONATIONS, USERS};
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn temp_db() -> (RedbStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RedbStore::open(&dir.path().join("test.redb"), COLLECTIONS).unwrap();
        (store, dir)
    }

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    fn user(id: &str, email: &str, username: &str) -> Document {
        doc(json!({
            "id": id,
            "email": email,
            "username": username,
            "name": username.to_uppercase(),
            "wallet_cents": 0
        }))
    }

    #[test]
    fn insert_then_find_by_id_and_unique_field() {
        let (store, _dir) = temp_db();
        store.insert_one(USERS, user("u1", "a@x.io", "alice")).unwrap();

        let by_id = store.find_one(USERS, &Filter::eq(ID_FIELD, "u1")).unwrap();
        assert_eq!(by_id.unwrap()["email"], "a@x.io");

        let by_email = store.find_one(USERS, &Filter::eq("email", "a@x.io")).unwrap();
        assert_eq!(by_email.unwrap()[ID_FIELD], "u1");

        let by_name = store.find_one(USERS, &Filter::eq("name", "ALICE")).unwrap();
        assert!(by_name.is_some());

        assert!(store
            .find_one(USERS, &Filter::eq("username", "bob"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn duplicate_unique_values_are_rejected_atomically() {
        let (store, _dir) = temp_db();
        store.insert_one(USERS, user("u1", "a@x.io", "alice")).unwrap();

        let err = store
            .insert_one(USERS, user("u2", "b@x.io", "alice"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { field: ref name } if name == "username"));

        // The rejected insert left nothing behind.
        assert!(store
            .find_one(USERS, &Filter::eq(ID_FIELD, "u2"))
            .unwrap()
            .is_none());
        assert!(store
            .find_one(USERS, &Filter::eq("email", "b@x.io"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn increments_are_applied_in_place() {
        let (store, _dir) = temp_db();
        store.insert_one(USERS, user("u1", "a@x.io", "alice")).unwrap();

        for _ in 0..3 {
            store
                .update_by_id(USERS, "u1", &Update::new().inc("wallet_cents", 1050))
                .unwrap();
        }
        store
            .update_by_id(USERS, "u1", &Update::new().set("bio", "hi"))
            .unwrap();

        let doc = store
            .find_one(USERS, &Filter::eq(ID_FIELD, "u1"))
            .unwrap()
            .unwrap();
        assert_eq!(doc["wallet_cents"], 3150);
        assert_eq!(doc["bio"], "hi");
        assert_eq!(doc["username"], "alice");
    }

    #[test]
    fn update_missing_document_is_not_found() {
        let (store, _dir) = temp_db();
        let err = store
            .update_by_id(USERS, "ghost", &Update::new().inc("wallet_cents", 1))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn aggregate_joins_across_collections() {
        let (store, _dir) = temp_db();
        store.insert_one(USERS, user("u1", "a@x.io", "alice")).unwrap();
        store.insert_one(USERS, user("u2", "b@x.io", "bob")).unwrap();
        store
            .insert_one(DONATIONS, doc(json!({"id": "d1", "from": "u1", "to": "u2", "at": 1})))
            .unwrap();
        store
            .insert_one(DONATIONS, doc(json!({"id": "d2", "from": "u1", "to": "u2", "at": 2})))
            .unwrap();

        let pipeline = Pipeline::new()
            .matching(Filter::eq("to", "u2"))
            .lookup(USERS, "from", ID_FIELD, "sender")
            .project([("id", "id"), ("sender", "sender.name")])
            .sort("id", SortOrder::Descending);
        let out = store.aggregate(DONATIONS, &pipeline).unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["id"], "d2");
        assert_eq!(out[0]["sender"], "ALICE");
    }

    /// Write raw bytes under `id`, bypassing every index.
    fn plant_corrupt_row(store: &RedbStore, collection: &str, id: &str) {
        let txn = store.db.begin_write().unwrap();
        {
            let mut table = txn.open_table(DocTable::new(collection)).unwrap();
            table.insert(id, b"not json".as_slice()).unwrap();
        }
        txn.commit().unwrap();
    }

    fn donation(id: &str, from: Option<&str>, to: &str, at: i64) -> Document {
        doc(json!({"id": id, "from_user_id": from, "to_user_id": to, "date": at}))
    }

    #[test]
    fn aggregate_reads_only_referenced_documents() {
        let (store, _dir) = temp_db();
        store.insert_one(USERS, user("u1", "a@x.io", "alice")).unwrap();
        store.insert_one(USERS, user("u2", "b@x.io", "bob")).unwrap();
        store.insert_one(USERS, user("u3", "c@x.io", "carol")).unwrap();
        for (id, from, to, at) in [
            ("d1", Some("u1"), "u2", 1),
            ("d2", None, "u2", 2),
            ("d3", Some("u1"), "u3", 3),
        ] {
            store.insert_one(DONATIONS, donation(id, from, to, at)).unwrap();
        }

        // Unreadable rows nobody references: any full scan would fail on them.
        plant_corrupt_row(&store, USERS, "u9");
        plant_corrupt_row(&store, DONATIONS, "d9");
        assert!(store.scan(USERS).is_err());
        assert!(store.scan(DONATIONS).is_err());

        let recent = Pipeline::new()
            .matching(Filter::eq("to_user_id", "u2"))
            .sort("date", SortOrder::Descending)
            .lookup(USERS, "from_user_id", ID_FIELD, "sender")
            .project([("id", "id"), ("sender", "sender.name")]);
        let out = store.aggregate(DONATIONS, &recent).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["id"], "d2");
        assert!(out[0].get("sender").is_none());
        assert_eq!(out[1]["id"], "d1");
        assert_eq!(out[1]["sender"], "ALICE");

        // Selected ids are fetched by key, then checked against the recipient.
        let selected = Pipeline::new()
            .matching(Filter::eq("to_user_id", "u2").and_in(ID_FIELD, ["d1", "d3", "d404"]))
            .lookup(USERS, "from_user_id", ID_FIELD, "sender");
        let out = store.aggregate(DONATIONS, &selected).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["id"], "d1");
        assert_eq!(out[0]["sender"]["username"], "alice");
    }

    #[test]
    fn value_index_follows_updates() {
        let (store, _dir) = temp_db();
        store.insert_one(DONATIONS, donation("d1", None, "u1", 1)).unwrap();
        store.insert_one(DONATIONS, donation("d2", None, "u1", 2)).unwrap();
        store.insert_one(DONATIONS, donation("d3", None, "u2", 3)).unwrap();

        let to = |user: &str| {
            let mut ids: Vec<String> = store
                .select(DONATIONS, &Filter::eq("to_user_id", user))
                .unwrap()
                .into_iter()
                .map(|d| d[ID_FIELD].as_str().unwrap().to_string())
                .collect();
            ids.sort();
            ids
        };
        assert_eq!(to("u1"), ["d1", "d2"]);
        assert_eq!(to("u2"), ["d3"]);

        store
            .update_by_id(DONATIONS, "d2", &Update::new().set("to_user_id", "u2"))
            .unwrap();
        assert_eq!(to("u1"), ["d1"]);
        assert_eq!(to("u2"), ["d2", "d3"]);
        assert!(to("u3").is_empty());
    }

    #[test]
    fn data_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("store.redb");
        {
            let store = RedbStore::open(&path, COLLECTIONS).unwrap();
            store.insert_one(USERS, user("u1", "a@x.io", "alice")).unwrap();
        }
        let store = RedbStore::open(&path, COLLECTIONS).unwrap();
        assert!(store
            .find_one(USERS, &Filter::eq("username", "alice"))
            .unwrap()
            .is_some());
        store.ping().unwrap();
    }
}
