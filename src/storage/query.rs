// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Typed query model for the document store.
//!
//! Every backend evaluates filters, updates and aggregation pipelines with
//! the functions in this module, so behaviour is identical whether records
//! live in redb or in memory.
//!
//! ## Pipeline stages
//!
//! - [`Stage::Match`]: keep documents matching a [`Filter`]
//! - [`Stage::Lookup`]: join one document from another collection
//! - [`Stage::Project`]: reshape documents to a list of output fields
//! - [`Stage::Sort`]: order by one field
//! - [`Stage::Limit`]: truncate

use std::cmp::Ordering;
use std::collections::HashMap;

use serde_json::{Map, Value};

use super::{StoreError, StoreResult};

/// A stored record: a JSON object keyed by field name.
pub type Document = Map<String, Value>;

/// Name of the primary key field present on every document.
pub const ID_FIELD: &str = "id";

/// Read a possibly nested field (`"sender.name"`).
pub fn field<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Canonical string form of a value, used for index keys and joins.
pub fn index_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// =============================================================================
// Filter
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(String, Value),
    In(String, Vec<Value>),
}

/// Conjunction of field conditions. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a single equality filter.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new().and_eq(field, value)
    }

    pub fn and_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::Eq(field.into(), value.into()));
        self
    }

    pub fn and_in<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.conditions.push(Condition::In(
            field.into(),
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Values the filter restricts `name` to, if any condition pins it.
    ///
    /// Every matching document carries one of the returned values, so
    /// backends may resolve the filter through a key or index lookup on
    /// `name` and apply [`Filter::matches`] to the candidates only.
    pub fn values_on(&self, name: &str) -> Option<Vec<&Value>> {
        self.conditions.iter().find_map(|c| match c {
            Condition::Eq(f, v) if f == name => Some(vec![v]),
            Condition::In(f, vs) if f == name => Some(vs.iter().collect()),
            _ => None,
        })
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.conditions.iter().all(|condition| match condition {
            Condition::Eq(name, expected) => field(doc, name) == Some(expected),
            Condition::In(name, allowed) => {
                field(doc, name).is_some_and(|value| allowed.contains(value))
            }
        })
    }
}

// =============================================================================
// Update
// =============================================================================

/// Partial update applied to one document: `set` overwrites fields,
/// `inc` adds to numeric fields (missing fields count as zero).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    pub set: Document,
    pub inc: Map<String, Value>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.insert(field.into(), value.into());
        self
    }

    pub fn inc(mut self, field: impl Into<String>, delta: i64) -> Self {
        self.inc.insert(field.into(), Value::from(delta));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.inc.is_empty()
    }

    /// Apply the update in place.
    pub fn apply(&self, doc: &mut Document) -> StoreResult<()> {
        if self.set.contains_key(ID_FIELD) || self.inc.contains_key(ID_FIELD) {
            return Err(StoreError::InvalidUpdate(
                "the id field is immutable".to_string(),
            ));
        }

        for (name, value) in &self.set {
            doc.insert(name.clone(), value.clone());
        }

        for (name, delta) in &self.inc {
            let current = doc.get(name).cloned().unwrap_or(Value::from(0));
            let next = add_numbers(&current, delta).ok_or_else(|| {
                StoreError::InvalidUpdate(format!("cannot increment field {name} by {delta}"))
            })?;
            doc.insert(name.clone(), next);
        }

        Ok(())
    }
}

fn add_numbers(current: &Value, delta: &Value) -> Option<Value> {
    match (current.as_i64(), delta.as_i64()) {
        (Some(a), Some(b)) => a.checked_add(b).map(Value::from),
        _ => {
            let sum = current.as_f64()? + delta.as_f64()?;
            serde_json::Number::from_f64(sum).map(Value::Number)
        }
    }
}

// =============================================================================
// Pipeline
// =============================================================================

/// Left join of a single foreign document, embedded under `as_field`.
/// Documents without a match keep no `as_field` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    pub from: String,
    pub local_field: String,
    pub foreign_field: String,
    pub as_field: String,
}

/// One projected output field: `output` is filled from the value at `source`.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub output: String,
    pub source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Filter),
    Lookup(Lookup),
    Project(Vec<Projection>),
    Sort { field: String, order: SortOrder },
    Limit(usize),
}

/// Ordered list of aggregation stages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn matching(mut self, filter: Filter) -> Self {
        self.stages.push(Stage::Match(filter));
        self
    }

    pub fn lookup(
        mut self,
        from: impl Into<String>,
        local_field: impl Into<String>,
        foreign_field: impl Into<String>,
        as_field: impl Into<String>,
    ) -> Self {
        self.stages.push(Stage::Lookup(Lookup {
            from: from.into(),
            local_field: local_field.into(),
            foreign_field: foreign_field.into(),
            as_field: as_field.into(),
        }));
        self
    }

    /// Project `(output, source)` pairs.
    pub fn project<I, O, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (O, S)>,
        O: Into<String>,
        S: Into<String>,
    {
        self.stages.push(Stage::Project(
            fields
                .into_iter()
                .map(|(output, source)| Projection {
                    output: output.into(),
                    source: source.into(),
                })
                .collect(),
        ));
        self
    }

    pub fn sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.stages.push(Stage::Sort {
            field: field.into(),
            order,
        });
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.stages.push(Stage::Limit(n));
        self
    }

    /// Filter of the first stage when the pipeline opens with a match.
    ///
    /// Backends use it to select the input documents instead of scanning
    /// the whole collection; [`Pipeline::run`] still applies it.
    pub fn leading_filter(&self) -> Option<&Filter> {
        match self.stages.first() {
            Some(Stage::Match(filter)) => Some(filter),
            _ => None,
        }
    }

    /// Evaluate the pipeline over `docs`.
    ///
    /// `load` is called at most once per lookup stage with the foreign
    /// collection and a filter restricting the foreign field to the values
    /// the current documents reference. It is not called when no document
    /// references anything.
    pub fn run<F>(&self, mut docs: Vec<Document>, mut load: F) -> StoreResult<Vec<Document>>
    where
        F: FnMut(&str, &Filter) -> StoreResult<Vec<Document>>,
    {
        for stage in &self.stages {
            match stage {
                Stage::Match(filter) => docs.retain(|doc| filter.matches(doc)),
                Stage::Lookup(lookup) => {
                    let mut referenced: Vec<Value> = Vec::new();
                    for doc in &docs {
                        if let Some(value) = field(doc, &lookup.local_field) {
                            if !value.is_null() && !referenced.contains(value) {
                                referenced.push(value.clone());
                            }
                        }
                    }
                    if referenced.is_empty() {
                        continue;
                    }

                    let wanted = Filter::new().and_in(lookup.foreign_field.clone(), referenced);
                    let foreign: HashMap<String, Document> = load(&lookup.from, &wanted)?
                        .into_iter()
                        .filter_map(|doc| {
                            let key = field(&doc, &lookup.foreign_field).map(index_key)?;
                            Some((key, doc))
                        })
                        .collect();

                    for doc in &mut docs {
                        let joined = field(doc, &lookup.local_field)
                            .filter(|value| !value.is_null())
                            .map(index_key)
                            .and_then(|key| foreign.get(&key));
                        if let Some(joined) = joined {
                            doc.insert(lookup.as_field.clone(), Value::Object(joined.clone()));
                        }
                    }
                }
                Stage::Project(fields) => {
                    docs = docs
                        .into_iter()
                        .map(|doc| {
                            let mut out = Document::new();
                            for projection in fields {
                                if let Some(value) = field(&doc, &projection.source) {
                                    out.insert(projection.output.clone(), value.clone());
                                }
                            }
                            out
                        })
                        .collect();
                }
                Stage::Sort { field: name, order } => {
                    docs.sort_by(|a, b| {
                        let ordering = compare_values(field(a, name), field(b, name));
                        match order {
                            SortOrder::Ascending => ordering,
                            SortOrder::Descending => ordering.reverse(),
                        }
                    });
                }
                Stage::Limit(n) => docs.truncate(*n),
            }
        }
        Ok(docs)
    }
}

/// Total order used by sort stages: missing < null < bool < number < string.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Bool(_)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(_) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
        },
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn filter_matches_equality_and_membership() {
        let d = doc(json!({"id": "a", "to": "bob", "n": 3}));
        assert!(Filter::eq("to", "bob").matches(&d));
        assert!(!Filter::eq("to", "alice").matches(&d));
        assert!(Filter::new().and_in("id", ["a", "b"]).matches(&d));
        assert!(!Filter::eq("to", "bob").and_in("id", ["x"]).matches(&d));
        assert!(Filter::new().matches(&d));
        assert!(!Filter::eq("missing", "x").matches(&d));
    }

    #[test]
    fn update_sets_and_increments() {
        let mut d = doc(json!({"id": "u1", "wallet_cents": 1000, "bio": "old"}));
        Update::new()
            .set("bio", "new")
            .inc("wallet_cents", 250)
            .inc("fresh", 5)
            .apply(&mut d)
            .unwrap();
        assert_eq!(d["bio"], "new");
        assert_eq!(d["wallet_cents"], 1250);
        assert_eq!(d["fresh"], 5);
    }

    #[test]
    fn update_rejects_overflow_and_id_changes() {
        let mut d = doc(json!({"id": "u1", "n": i64::MAX}));
        let err = Update::new().inc("n", 1).apply(&mut d).unwrap_err();
        assert!(matches!(err, StoreError::InvalidUpdate(_)));

        let err = Update::new().set("id", "u2").apply(&mut d).unwrap_err();
        assert!(matches!(err, StoreError::InvalidUpdate(_)));
    }

    #[test]
    fn pipeline_joins_projects_sorts_and_limits() {
        let donations = vec![
            doc(json!({"id": "d1", "from": "u1", "to": "u2", "at": 10})),
            doc(json!({"id": "d2", "to": "u2", "at": 30})),
            doc(json!({"id": "d3", "from": "u1", "to": "u2", "at": 20})),
            doc(json!({"id": "d4", "from": "u2", "to": "u1", "at": 40})),
        ];
        let users = vec![
            doc(json!({"id": "u1", "name": "Alice"})),
            doc(json!({"id": "u2", "name": "Bob"})),
        ];

        let pipeline = Pipeline::new()
            .matching(Filter::eq("to", "u2"))
            .sort("at", SortOrder::Descending)
            .limit(2)
            .lookup("users", "from", "id", "sender")
            .project([("id", "id"), ("sender_name", "sender.name")]);

        let mut loads = 0;
        let out = pipeline
            .run(donations, |collection, wanted| {
                loads += 1;
                assert_eq!(collection, "users");
                Ok(users.iter().filter(|u| wanted.matches(u)).cloned().collect())
            })
            .unwrap();

        assert_eq!(loads, 1);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["id"], "d2");
        assert!(out[0].get("sender_name").is_none());
        assert_eq!(out[1]["id"], "d3");
        assert_eq!(out[1]["sender_name"], "Alice");
        assert!(out[1].get("to").is_none());
    }

    #[test]
    fn lookup_asks_only_for_referenced_keys() {
        let donations = vec![
            doc(json!({"id": "d1", "from": "u1"})),
            doc(json!({"id": "d2", "from": "u3"})),
            doc(json!({"id": "d3", "from": "u1"})),
            doc(json!({"id": "d4", "from": null})),
            doc(json!({"id": "d5"})),
        ];

        let mut asked = Vec::new();
        Pipeline::new()
            .lookup("users", "from", "id", "sender")
            .run(donations, |_, wanted| {
                asked = wanted
                    .values_on("id")
                    .unwrap()
                    .into_iter()
                    .map(index_key)
                    .collect();
                Ok(Vec::new())
            })
            .unwrap();
        assert_eq!(asked, ["u1", "u3"]);

        let anonymous = vec![doc(json!({"id": "d1", "from": null}))];
        let out = Pipeline::new()
            .lookup("users", "from", "id", "sender")
            .run(anonymous, |_, _| panic!("nothing to join"))
            .unwrap();
        assert!(out[0].get("sender").is_none());
    }

    #[test]
    fn filter_exposes_pinned_values() {
        let f = Filter::eq("to", "bob").and_in("id", ["a", "b"]);
        assert_eq!(f.values_on("to"), Some(vec![&json!("bob")]));
        assert_eq!(f.values_on("id"), Some(vec![&json!("a"), &json!("b")]));
        assert_eq!(f.values_on("bio"), None);

        let p = Pipeline::new().matching(f.clone()).limit(1);
        assert_eq!(p.leading_filter(), Some(&f));
        assert_eq!(Pipeline::new().limit(1).matching(f).leading_filter(), None);
    }

    #[test]
    fn sort_orders_mixed_values() {
        let docs = vec![
            doc(json!({"id": "b", "k": "z"})),
            doc(json!({"id": "c"})),
            doc(json!({"id": "a", "k": 2})),
            doc(json!({"id": "d", "k": 1.5})),
        ];
        let out = Pipeline::new()
            .sort("k", SortOrder::Ascending)
            .run(docs, |_, _| Ok(Vec::new()))
            .unwrap();
        let ids: Vec<_> = out.iter().map(|d| d["id"].as_str().unwrap()).collect();
        assert_eq!(ids, ["c", "d", "a", "b"]);
    }
}
