//! Captured node state.
//!
//! A node exports its state as a domain-keyed document: a map from domain
//! name (`agents`, `timeline`, `mood`, `validations`, ...) to an opaque
//! JSON value. Keyed domains may use either object form
//! (`{"A1": {...}}`) or list-of-records form (`[{"id": "A1", ...}]`);
//! [`lookup_entry`] and [`replace_entry`] address entries in both.

use std::borrow::Cow;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::platform::Platform;

/// A domain-keyed state document. `BTreeMap` keeps serialization ordered.
pub type StateDocument = BTreeMap<String, Value>;

/// Domains holding an ordered sequence of entries, oldest first.
pub const SEQUENCE_DOMAINS: [&str; 1] = ["timeline"];

const HISTORY_FIELD: &str = "history";

/// Field names recognised as record identifiers in list-of-records form.
pub const ID_FIELDS: [&str; 3] = ["id", "key", "name"];

/// State captured from exactly one node at one instant. Immutable once built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeState {
    platform: Platform,
    captured_at: DateTime<Utc>,
    document: StateDocument,
}

impl NodeState {
    pub fn new(platform: Platform, captured_at: DateTime<Utc>, document: StateDocument) -> Self {
        Self {
            platform,
            captured_at,
            document,
        }
    }

    /// Build a state from a JSON object; non-object values yield an empty document.
    pub fn from_json(platform: Platform, captured_at: DateTime<Utc>, value: Value) -> Self {
        let document = match value {
            Value::Object(map) => map.into_iter().collect(),
            _ => StateDocument::new(),
        };
        Self::new(platform, captured_at, document)
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn document(&self) -> &StateDocument {
        &self.document
    }

    /// The value of one domain, if the node reported it.
    pub fn domain(&self, name: &str) -> Option<&Value> {
        self.document.get(name)
    }

    /// Domain names in sorted order.
    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.document.keys().map(String::as_str)
    }

    /// Resolve `domain` or `domain` + entry `key` against this state.
    pub fn value_at(&self, domain: &str, key: Option<&str>) -> Option<&Value> {
        let value = self.domain(domain)?;
        match key {
            None => Some(value),
            Some(k) => lookup_entry(value, k),
        }
    }
}

/// Options a node honours when exporting its state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOptions {
    /// Restrict the export to these domains (`None` exports everything).
    pub domains: Option<Vec<String>>,
    /// Include historical entries (full timelines rather than heads).
    pub include_history: bool,
    /// Include node-local metadata domains.
    pub include_metadata: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            domains: None,
            include_history: true,
            include_metadata: false,
        }
    }
}

impl ExportOptions {
    /// Whether a domain should be part of the export.
    pub fn includes(&self, domain: &str) -> bool {
        match &self.domains {
            Some(list) => list.iter().any(|d| d == domain),
            None => true,
        }
    }

    /// Shape one domain's value for export.
    ///
    /// Without history, sequence domains keep only their head entry and
    /// records drop their `history` field.
    pub fn shape(&self, domain: &str, value: &Value) -> Value {
        if self.include_history {
            return value.clone();
        }
        match value {
            Value::Array(items) if SEQUENCE_DOMAINS.contains(&domain) => {
                Value::Array(items.last().cloned().into_iter().collect())
            }
            Value::Array(items) => Value::Array(items.iter().map(without_history).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .filter(|(k, _)| k.as_str() != HISTORY_FIELD)
                    .map(|(k, v)| (k.clone(), without_history(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

fn without_history(record: &Value) -> Value {
    match record {
        Value::Object(map) if map.contains_key(HISTORY_FIELD) => {
            let mut map = map.clone();
            map.remove(HISTORY_FIELD);
            Value::Object(map)
        }
        other => other.clone(),
    }
}

fn id_field(record: &Map<String, Value>) -> Option<(&'static str, &Value)> {
    ID_FIELDS.iter().find_map(|f| match record.get(*f)? {
        v @ (Value::String(_) | Value::Number(_)) => Some((*f, v)),
        _ => None,
    })
}

fn id_text(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The identifier of a record in list-of-records form.
pub fn record_id(record: &Value) -> Option<String> {
    id_field(record.as_object()?).map(|(_, id)| id_text(id))
}

/// An entry's payload without the identifier field that names `key`.
///
/// `[{"id": "A1", "trust": 80}]` and `{"A1": {"trust": 80}}` hold the same
/// entry; comparing bodies makes the two forms agree.
pub fn entry_body<'a>(key: &str, entry: &'a Value) -> Cow<'a, Value> {
    if let Value::Object(map) = entry {
        if let Some((field, id)) = id_field(map) {
            if id_text(id) == key {
                let mut body = map.clone();
                body.remove(field);
                return Cow::Owned(Value::Object(body));
            }
        }
    }
    Cow::Borrowed(entry)
}

/// Normalise a keyed domain into an ordered `key -> entry` view.
///
/// Returns `None` when the value is neither an object nor a list of
/// identifiable records.
pub fn keyed_entries(value: &Value) -> Option<BTreeMap<String, &Value>> {
    match value {
        Value::Object(map) => Some(map.iter().map(|(k, v)| (k.clone(), v)).collect()),
        Value::Array(items) => {
            let mut out = BTreeMap::new();
            for item in items {
                out.insert(record_id(item)?, item);
            }
            Some(out)
        }
        _ => None,
    }
}

/// Look up an entry by key in either keyed form.
pub fn lookup_entry<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(key),
        Value::Array(items) => items
            .iter()
            .find(|item| record_id(item).as_deref() == Some(key)),
        _ => None,
    }
}

/// Replace an entry by key in either keyed form. Returns `false` if the
/// entry could not be addressed.
///
/// In list form the replaced record keeps its identifier field when the
/// new entry carries none.
pub fn replace_entry(value: &mut Value, key: &str, entry: Value) -> bool {
    match value {
        Value::Object(map) => {
            map.insert(key.to_string(), entry);
            true
        }
        Value::Array(items) => {
            let Some(slot) = items
                .iter_mut()
                .find(|item| record_id(item).as_deref() == Some(key))
            else {
                return false;
            };
            let identity = slot
                .as_object()
                .and_then(id_field)
                .map(|(field, id)| (field, id.clone()));
            let mut entry = entry;
            if let (Some((field, id)), Value::Object(record)) = (identity, &mut entry) {
                if id_field(record).is_none() {
                    record.insert(field.to_string(), id);
                }
            }
            *slot = entry;
            true
        }
        _ => false,
    }
}
