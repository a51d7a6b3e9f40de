//! An instrumented, ordered record collection.
//!
//! [`RecordBook`] is a string-keyed collection of JSON values that exposes
//! the standard collection protocols (indexing, length, iteration, display
//! and debug rendering, equality) and reports each protocol use through its
//! [`Probe`]. Iteration is always in key order.

use std::collections::{btree_map, BTreeMap};
use std::fmt;
use std::ops::Index;

use serde_json::Value;

use crate::probe::{Probe, ProbeOp};

/// An ordered collection of named records with protocol instrumentation.
#[derive(Default)]
pub struct RecordBook {
    entries: BTreeMap<String, Value>,
    probe: Probe,
}

impl RecordBook {
    /// Create an empty book without instrumentation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty book reporting to the given probe.
    #[must_use]
    pub fn with_probe(probe: Probe) -> Self {
        Self {
            entries: BTreeMap::new(),
            probe,
        }
    }

    /// Build a book from key/value pairs, without instrumentation.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            probe: Probe::disabled(),
        }
    }

    /// Insert a record, returning the previous value for the key if any.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        self.probe
            .record(ProbeOp::Set, format!("book[{key}]"), value.to_string());
        self.entries.insert(key, value)
    }

    /// Look up a record by key.
    ///
    /// The lookup is recorded whether or not the key exists.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.probe.record(ProbeOp::Get, format!("book[{key}]"), "");
        self.entries.get(key)
    }

    /// Remove a record by key, returning its value if it was present.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.probe
            .record(ProbeOp::Remove, format!("book[{key}]"), "");
        self.entries.remove(key)
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.probe
            .record(ProbeOp::Len, "book", self.entries.len().to_string());
        self.entries.len()
    }

    /// Check whether the book has no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over records in key order.
    #[must_use]
    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.probe.record(ProbeOp::Iter, "book", "");
        self.entries.iter()
    }

    /// Iterate over keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.probe.record(ProbeOp::Iter, "book.keys", "");
        self.entries.keys()
    }

    /// Check whether a key is present, without recording a lookup.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

impl Index<&str> for RecordBook {
    type Output = Value;

    /// Index into the book.
    ///
    /// # Panics
    ///
    /// Panics if the key is not present, matching the indexing protocol of
    /// the standard map types. Use [`RecordBook::get`] for a checked lookup.
    fn index(&self, key: &str) -> &Value {
        self.get(key)
            .unwrap_or_else(|| panic!("no record found for key {key:?}"))
    }
}

impl<'a> IntoIterator for &'a RecordBook {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Extend<(String, Value)> for RecordBook {
    fn extend<I: IntoIterator<Item = (String, Value)>>(&mut self, pairs: I) {
        for (key, value) in pairs {
            self.insert(key, value);
        }
    }
}

impl FromIterator<(String, Value)> for RecordBook {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(pairs: I) -> Self {
        Self::from_pairs(pairs)
    }
}

impl PartialEq for RecordBook {
    /// Books are equal when their records are; probes are not compared.
    fn eq(&self, other: &Self) -> bool {
        self.probe.record(ProbeOp::Compare, "book", "");
        self.entries == other.entries
    }
}

impl fmt::Display for RecordBook {
    /// Reader-facing summary, e.g. `RecordBook with 2 records: a=1, b="x"`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.probe.record(ProbeOp::Render, "book", "display");
        write!(f, "RecordBook with {} records", self.entries.len())?;
        if self.entries.is_empty() {
            return Ok(());
        }
        let rendered: Vec<String> = self
            .entries
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        write!(f, ": {}", rendered.join(", "))
    }
}

impl fmt::Debug for RecordBook {
    /// Developer-facing rendering, e.g. `RecordBook {"a": 1, "b": "x"}`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.probe.record(ProbeOp::Render, "book", "debug");
        let rendered: Vec<String> = self
            .entries
            .iter()
            .map(|(k, v)| format!("{k:?}: {v}"))
            .collect();
        write!(f, "RecordBook {{{}}}", rendered.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_book() -> RecordBook {
        RecordBook::from_pairs([("a", 1), ("b", 2)])
    }

    #[test]
    fn test_insert_get_len() {
        let mut book = sample_book();
        book.insert("c", 3);

        assert_eq!(book.get("b"), Some(&Value::from(2)));
        assert_eq!(book.len(), 3);
    }

    #[test]
    fn test_index_existing_key() {
        let book = sample_book();
        assert_eq!(book["b"], Value::from(2));
    }

    #[test]
    #[should_panic(expected = "no record found for key")]
    fn test_index_missing_key_panics() {
        let book = sample_book();
        let _ = &book["zzz"];
    }

    #[test]
    fn test_get_missing_returns_none_but_records() {
        let probe = Probe::new();
        let book = RecordBook::with_probe(probe.clone());

        assert!(book.get("nope").is_none());
        assert_eq!(probe.ops(), vec![ProbeOp::Get]);
    }

    #[test]
    fn test_iteration_is_in_key_order() {
        let mut book = RecordBook::new();
        book.insert("b", 2);
        book.insert("a", 1);
        book.insert("c", 3);

        let keys: Vec<&String> = book.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);

        // A second pass sees the same order.
        let again: Vec<&String> = (&book).into_iter().map(|(k, _)| k).collect();
        assert_eq!(again, keys);
    }

    #[test]
    fn test_probe_sequence_mirrors_calls() {
        let probe = Probe::new();
        let mut book = RecordBook::with_probe(probe.clone());

        book.insert("a", 1);
        book.insert("b", 2);
        let _ = book.get("a");
        let _ = book.len();

        assert_eq!(
            probe.ops(),
            vec![ProbeOp::Set, ProbeOp::Set, ProbeOp::Get, ProbeOp::Len]
        );
    }

    #[test]
    fn test_display() {
        let book = sample_book();
        assert_eq!(book.to_string(), "RecordBook with 2 records: a=1, b=2");

        let empty = RecordBook::new();
        assert_eq!(empty.to_string(), "RecordBook with 0 records");
    }

    #[test]
    fn test_debug() {
        let mut book = RecordBook::new();
        book.insert("a", 1);
        book.insert("b", "two");

        assert_eq!(format!("{book:?}"), r#"RecordBook {"a": 1, "b": "two"}"#);
    }

    #[test]
    fn test_render_recorded_on_display_and_debug() {
        let probe = Probe::new();
        let mut book = RecordBook::with_probe(probe.clone());
        book.insert("a", 1);
        probe.clear();

        let _ = book.to_string();
        let _ = format!("{book:?}");

        assert_eq!(probe.ops(), vec![ProbeOp::Render, ProbeOp::Render]);
    }

    #[test]
    fn test_equality_by_contents() {
        let left = sample_book();
        let right = RecordBook::from_pairs([("b", 2), ("a", 1)]);
        let other = RecordBook::from_pairs([("a", 1)]);

        assert_eq!(left, right);
        assert_ne!(left, other);
    }

    #[test]
    fn test_remove() {
        let mut book = sample_book();

        assert_eq!(book.remove("a"), Some(Value::from(1)));
        assert_eq!(book.remove("a"), None);
        assert!(!book.contains_key("a"));
    }

    #[test]
    fn test_extend_and_from_iterator() {
        let mut book = sample_book();
        book.extend(vec![("c".to_string(), Value::from(3))]);
        assert_eq!(book.len(), 3);

        let collected: RecordBook = vec![("x".to_string(), Value::from(9))]
            .into_iter()
            .collect();
        assert_eq!(collected["x"], Value::from(9));
    }

    #[test]
    fn test_insert_returns_previous_value() {
        let mut book = RecordBook::new();
        assert_eq!(book.insert("a", 1), None);
        assert_eq!(book.insert("a", 2), Some(Value::from(1)));
        assert_eq!(book["a"], Value::from(2));
    }
}
