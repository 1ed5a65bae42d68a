//! Items of a synced ordered collection.

use crate::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A flat field mapping as stored by the backend.
pub type Fields = Map<String, Value>;

/// A record exactly as a channel delivers it: the backend key plus its
/// fields, nothing interpreted yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Backend-assigned (or slug-derived) key.
    pub id: String,
    /// Every stored field, including `order` and `createdAt` if present.
    pub fields: Fields,
}

impl RawRecord {
    /// Creates a raw record.
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }
}

/// One normalized entry of a collection snapshot.
///
/// `order` and `created_at` are lifted out of the field map during
/// normalization so that sorting never has to re-parse the wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Unique within one snapshot.
    pub id: String,
    /// Remaining fields.
    pub fields: Fields,
    /// Manual sort position, when the record carries an integral one.
    pub order: Option<i64>,
    /// Creation time, when the record carries one we understand.
    pub created_at: Option<Timestamp>,
}

impl Item {
    /// Creates an item with no order and no creation time.
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
            order: None,
            created_at: None,
        }
    }

    /// Sets the order field.
    #[must_use]
    pub fn with_order(mut self, order: i64) -> Self {
        self.order = Some(order);
        self
    }

    /// Sets the creation timestamp.
    #[must_use]
    pub fn with_created_at(mut self, created_at: Timestamp) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Normalizes a raw record. Total: every record produces an item.
    ///
    /// `order` is kept only when it is an integral number; `createdAt` goes
    /// through [`Timestamp::from_wire`].
    #[must_use]
    pub fn from_record(record: RawRecord) -> Self {
        let RawRecord { id, mut fields } = record;
        let order = fields.remove("order").as_ref().and_then(integral);
        let created_at = fields
            .remove("createdAt")
            .as_ref()
            .and_then(Timestamp::from_wire);
        Self {
            id,
            fields,
            order,
            created_at,
        }
    }

    /// Creation time in millis, with missing treated as the epoch.
    #[must_use]
    pub fn created_millis(&self) -> i64 {
        self.created_at.unwrap_or(Timestamp::EPOCH).as_millis()
    }

    /// Returns a string field, or `""` when missing or not a string.
    #[must_use]
    pub fn str_field(&self, key: &str) -> &str {
        self.fields.get(key).and_then(Value::as_str).unwrap_or("")
    }

    /// Returns a field value.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

fn integral(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    value
        .as_f64()
        .filter(|f| f.is_finite() && f.fract() == 0.0)
        .map(|f| f as i64)
}
