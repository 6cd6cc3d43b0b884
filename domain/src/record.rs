//! Schema-less table row.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::StoreError;

/// A single table row: a flat JSON object keyed by column name.
///
/// Rows carry no type of their own; the owning table's schema is checked at
/// the store boundary (see [`crate::validate`]).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn id(&self) -> Option<&str> {
        self.str("id")
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    /// String value of `column`, if present and a string.
    pub fn str(&self, column: &str) -> Option<&str> {
        self.0.get(column).and_then(Value::as_str)
    }

    pub fn i64(&self, column: &str) -> Option<i64> {
        self.0.get(column).and_then(Value::as_i64)
    }

    pub fn bool(&self, column: &str) -> Option<bool> {
        self.0.get(column).and_then(Value::as_bool)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    pub fn set<K: Into<String>, V: Into<Value>>(&mut self, column: K, value: V) {
        self.0.insert(column.into(), value.into());
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.0.remove(column)
    }

    /// Builder-style `set`, handy when assembling rows inline.
    pub fn with<K: Into<String>, V: Into<Value>>(mut self, column: K, value: V) -> Self {
        self.set(column, value);
        self
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Shallow merge: every column of `patch` replaces the column here.
    pub fn merge(&mut self, patch: &Record) {
        for (k, v) in patch.0.iter() {
            self.0.insert(k.clone(), v.clone());
        }
    }

    /// Copy of this row restricted to `columns`. Missing columns are skipped.
    pub fn project(&self, columns: &[&str]) -> Record {
        let mut out = Map::new();
        for col in columns {
            if let Some(v) = self.0.get(*col) {
                out.insert((*col).to_string(), v.clone());
            }
        }
        Record(out)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Record {
    type Error = StoreError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            _ => Err(StoreError::NotAnObject),
        }
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        record.into_value()
    }
}
