//! Match aggregation.
//!
//! Snapshots copy everything they need out of the live hive accessors at
//! match time, so results stay valid after the hive is closed. One
//! aggregate [`Match`] exists per term per walk; repeated hits extend it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::engine::term::SearchTerm;
use crate::hive::{HiveKey, HiveValue, KeyKind, ValueKind};

/// Owned snapshot of a key that satisfied a term.
#[derive(Debug, Clone)]
pub struct KeyMatch {
    pub key_path: String,
    pub key_name: String,
    pub class_name: String,
    pub subkey_count: u32,
    pub value_count: u32,
    pub last_modified: DateTime<Utc>,
    pub key_kind: KeyKind,
}

impl KeyMatch {
    pub(crate) fn snapshot(key: &dyn HiveKey) -> Self {
        KeyMatch {
            key_path: key.path().to_string(),
            key_name: key.name().to_string(),
            class_name: key.class_name().to_string(),
            subkey_count: key.subkey_count(),
            value_count: key.value_count(),
            last_modified: key.last_modified(),
            key_kind: key.kind(),
        }
    }
}

/// Owned snapshot of a value that satisfied a term, including a private
/// copy of the value data.
#[derive(Debug, Clone)]
pub struct ValueMatch {
    pub key_path: String,
    pub key_name: String,
    pub class_name: String,
    pub key_kind: KeyKind,
    pub last_modified: DateTime<Utc>,
    pub value_name: String,
    pub value_kind: ValueKind,
    pub data: Vec<u8>,
}

impl ValueMatch {
    pub(crate) fn snapshot(value: &dyn HiveValue) -> Self {
        let parent = value.parent();
        ValueMatch {
            key_path: parent.path().to_string(),
            key_name: parent.name().to_string(),
            class_name: parent.class_name().to_string(),
            key_kind: parent.kind(),
            last_modified: parent.last_modified(),
            value_name: value.name().to_string(),
            value_kind: value.kind(),
            data: value.data().to_vec(),
        }
    }

    pub fn data_len(&self) -> usize {
        self.data.len()
    }
}

/// Aggregate record of every key and value that satisfied one term during
/// a walk.
#[derive(Debug, Clone)]
pub struct Match {
    term: Arc<SearchTerm>,
    pub keys: Vec<KeyMatch>,
    pub values: Vec<ValueMatch>,
}

impl Match {
    fn new(term: Arc<SearchTerm>) -> Self {
        Match {
            term,
            keys: Vec::new(),
            values: Vec::new(),
        }
    }

    /// The term this match was created for.
    pub fn term(&self) -> &SearchTerm {
        &self.term
    }
}

/// Engine-wide table mapping each term to its single aggregate match,
/// keyed by the term id assigned at registration.
#[derive(Default)]
pub(crate) struct MatchTable {
    by_term: HashMap<usize, Match>,
}

impl MatchTable {
    pub(crate) fn new() -> Self {
        MatchTable::default()
    }

    pub(crate) fn record_key(&mut self, term: &Arc<SearchTerm>, key: &dyn HiveKey) {
        self.by_term
            .entry(term.id())
            .or_insert_with(|| Match::new(term.clone()))
            .keys
            .push(KeyMatch::snapshot(key));
    }

    pub(crate) fn record_value(&mut self, term: &Arc<SearchTerm>, value: &dyn HiveValue) {
        self.by_term
            .entry(term.id())
            .or_insert_with(|| Match::new(term.clone()))
            .values
            .push(ValueMatch::snapshot(value));
    }

    pub(crate) fn get(&self, term_id: usize) -> Option<&Match> {
        self.by_term.get(&term_id)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Match> {
        self.by_term.values()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_term.len()
    }

    pub(crate) fn clear(&mut self) {
        self.by_term.clear();
    }
}
