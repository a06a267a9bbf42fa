//! Raw inbound records and the invocation envelope that carries them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys under which a batch of records may be delivered.
const RECORDS_KEYS: [&str; 2] = ["Records", "records"];

/// One raw inbound record, exactly as delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Value);

impl Record {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn as_object(&self) -> Option<&Map<String, Value>> {
        self.0.as_object()
    }

    /// Top-level field lookup.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Top-level string field lookup.
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }
}

impl From<Value> for Record {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// The records of one top-level invocation.
///
/// An event shaped as `{"Records": [...]}` (or `{"records": [...]}`) is a batch;
/// anything else is a single bare record and gets wrapped.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    records: Vec<Record>,
    many: bool,
}

impl Invocation {
    pub fn from_event(event: Value) -> Self {
        match event {
            Value::Object(mut map) => {
                for key in RECORDS_KEYS {
                    if matches!(map.get(key), Some(Value::Array(_))) {
                        if let Some(Value::Array(items)) = map.remove(key) {
                            return Self::batch(items.into_iter().map(Record::new).collect());
                        }
                    }
                }
                Self::single(Record::new(Value::Object(map)))
            }
            other => Self::single(Record::new(other)),
        }
    }

    pub fn single(record: Record) -> Self {
        Self {
            records: vec![record],
            many: false,
        }
    }

    pub fn batch(records: Vec<Record>) -> Self {
        Self {
            records,
            many: true,
        }
    }

    /// Whether the caller expects a list back rather than a single value.
    pub fn is_many(&self) -> bool {
        self.many
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Re-wrap the records into the batch envelope shape.
    pub fn to_event(&self) -> Value {
        let records = self.records.iter().map(|r| r.as_value().clone()).collect();
        let mut map = Map::new();
        map.insert(RECORDS_KEYS[0].to_string(), Value::Array(records));
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn batch_envelope_is_many() {
        let inv = Invocation::from_event(json!({"Records": [{"a": 1}, {"b": 2}]}));
        assert!(inv.is_many());
        assert_eq!(inv.len(), 2);
        assert_eq!(inv.records()[1].get("b"), Some(&json!(2)));
    }

    #[test]
    fn lowercase_records_key_is_accepted() {
        let inv = Invocation::from_event(json!({"records": [{"a": 1}]}));
        assert!(inv.is_many());
        assert_eq!(inv.len(), 1);
    }

    #[test]
    fn bare_record_is_wrapped() {
        let inv = Invocation::from_event(json!({"type": "reindex"}));
        assert!(!inv.is_many());
        assert_eq!(inv.records(), &[Record::new(json!({"type": "reindex"}))]);
    }

    #[test]
    fn non_array_records_field_is_a_bare_record() {
        let inv = Invocation::from_event(json!({"Records": "nope"}));
        assert!(!inv.is_many());
        assert_eq!(inv.records()[0].str_field("Records"), Some("nope"));
    }

    #[test]
    fn to_event_rewraps() {
        let event = json!({"Records": [{"a": 1}]});
        assert_eq!(Invocation::from_event(event.clone()).to_event(), event);
    }
}
