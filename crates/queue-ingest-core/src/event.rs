//! Structured events and the decorations applied before they are emitted.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Field holding the event time
pub const TIMESTAMP_FIELD: &str = "@timestamp";

/// Field holding event tags
pub const TAGS_FIELD: &str = "tags";

/// Field holding the event type
pub const TYPE_FIELD: &str = "type";

/// A structured event decoded from a message body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Event(Map<String, Value>);

impl Event {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Set a field, returning the previous value
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    /// Set a field only when it is not already present
    pub fn insert_if_absent(&mut self, field: &str, value: impl Into<Value>) {
        if !self.0.contains_key(field) {
            self.0.insert(field.to_string(), value.into());
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append a tag unless the event already carries it
    pub fn add_tag(&mut self, tag: &str) {
        let tags = self
            .0
            .entry(TAGS_FIELD.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));

        // A scalar tags field becomes the first element of the list
        if !tags.is_array() {
            let existing = std::mem::take(tags);
            *tags = Value::Array(vec![existing]);
        }

        if let Value::Array(list) = tags {
            if !list.iter().any(|t| t.as_str() == Some(tag)) {
                list.push(Value::String(tag.to_string()));
            }
        }
    }
}

impl From<Map<String, Value>> for Event {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Enrichment applied to every event before it reaches the sink
///
/// Fields already present on the event are never overwritten. Tags are
/// appended without duplicates. `Decorator::default()` never stamps
/// `@timestamp`; `Decorator::new()` does.
#[derive(Debug, Clone, Default)]
pub struct Decorator {
    event_type: Option<String>,
    tags: Vec<String>,
    add_fields: BTreeMap<String, String>,
    stamp_time: bool,
}

impl Decorator {
    /// Decorator that only stamps `@timestamp`
    pub fn new() -> Self {
        Self {
            stamp_time: true,
            ..Self::default()
        }
    }

    pub fn with_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_fields.insert(field.into(), value.into());
        self
    }

    pub fn decorate(&self, event: &mut Event) {
        if let Some(event_type) = &self.event_type {
            event.insert_if_absent(TYPE_FIELD, event_type.clone());
        }

        for tag in &self.tags {
            event.add_tag(tag);
        }

        for (field, value) in &self.add_fields {
            event.insert_if_absent(field, value.clone());
        }

        if self.stamp_time {
            event.insert_if_absent(
                TIMESTAMP_FIELD,
                Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            );
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
