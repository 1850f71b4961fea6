use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single log record ready for batching and transmission.
///
/// This is the canonical unit of shipment throughout the pipeline: an opaque
/// string-keyed field map. The transport never inspects field names or
/// values; whatever a producer enqueues is serialized verbatim as one element
/// of the batch payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self { fields: Map::new() }
    }

    /// Builds a record carrying a single `message` field, the common case
    /// for plain-text log lines.
    pub fn from_message(message: impl Into<String>) -> Self {
        let mut record = Self::new();
        record.insert("message", Value::String(message.into()));
        record
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Estimates the serialized size of this record in bytes.
    ///
    /// Used for byte-based flush accounting, so it favors a cheap walk over
    /// exactness: strings count their UTF-8 length plus quotes, numbers a
    /// flat 16 bytes, containers their delimiters.
    pub fn estimated_size(&self) -> usize {
        2 + object_size(&self.fields)
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

fn object_size(map: &Map<String, Value>) -> usize {
    map.iter()
        .map(|(key, value)| key.len() + 3 + estimate_value_size(value))
        .sum()
}

fn estimate_value_size(value: &Value) -> usize {
    match value {
        Value::Null => 4,
        Value::Bool(_) => 5,
        Value::Number(_) => 16,
        Value::String(text) => text.len() + 2,
        Value::Array(items) => 2 + items.iter().map(estimate_value_size).sum::<usize>(),
        Value::Object(map) => 2 + object_size(map),
    }
}
