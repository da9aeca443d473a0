//! Per-record validation errors
//!
//! An `ErrorSet` maps field names to the ordered messages produced by the
//! most recent validation of that field. Entries are replaced wholesale,
//! never appended across runs; a field whose list becomes empty is removed,
//! so an empty set means the record is valid.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ErrorSet {
    entries: IndexMap<String, Vec<String>>,
}

impl ErrorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of fields with at least one message.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Messages for `field`; empty when the field has none.
    pub fn get(&self, field: &str) -> &[String] {
        self.entries.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, field: &str) -> bool {
        self.entries.contains_key(field)
    }

    /// Replaces the messages for `field`.
    pub fn replace(&mut self, field: impl Into<String>, messages: Vec<String>) {
        let field = field.into();
        if messages.is_empty() {
            self.entries.shift_remove(&field);
        } else {
            self.entries.insert(field, messages);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(field, messages)| (field.as_str(), messages.as_slice()))
    }

    /// Every message, in field order.
    pub fn full_messages(&self) -> Vec<String> {
        self.entries.values().flatten().cloned().collect()
    }
}

impl fmt::Display for ErrorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_messages().join("; "))
    }
}
