//! Creation/update timestamps as they appear on the wire.
//!
//! Backends disagree on how a timestamp is encoded. A record may carry a
//! plain millisecond number, an object exposing `seconds`/`nanoseconds`
//! (or the underscored admin-SDK spelling), an RFC 3339 string, or nothing
//! at all. [`Timestamp::from_wire`] folds all of them into epoch millis.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use std::str::FromStr;

/// Key of the placeholder object a writer sends when the backend should
/// stamp the field with its own clock.
pub const SERVER_TIMESTAMP_KEY: &str = ".sv";

/// Returns the "stamp this on the server" placeholder.
#[must_use]
pub fn server_timestamp() -> Value {
    json!({ SERVER_TIMESTAMP_KEY: "timestamp" })
}

/// Returns true if `value` is the server timestamp placeholder.
#[must_use]
pub fn is_server_timestamp(value: &Value) -> bool {
    value
        .as_object()
        .and_then(|obj| obj.get(SERVER_TIMESTAMP_KEY))
        .and_then(Value::as_str)
        == Some("timestamp")
}

/// Milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// The Unix epoch. Missing timestamps compare as this value.
    pub const EPOCH: Self = Self(0);

    /// Current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    /// Creates a timestamp from epoch millis.
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns epoch millis.
    #[must_use]
    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    /// Normalizes any of the accepted wire encodings. Unknown shapes,
    /// non-finite numbers and unresolved placeholders yield `None`.
    #[must_use]
    pub fn from_wire(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => {
                if let Some(millis) = n.as_i64() {
                    return Some(Self(millis));
                }
                n.as_f64()
                    .filter(|f| f.is_finite())
                    .map(|f| Self(f.trunc() as i64))
            }
            Value::Object(obj) => {
                let seconds = obj.get("seconds").or_else(|| obj.get("_seconds"))?;
                let seconds = seconds.as_i64()?;
                let nanos = obj
                    .get("nanoseconds")
                    .or_else(|| obj.get("_nanoseconds"))
                    .and_then(Value::as_i64)
                    .unwrap_or(0);
                Some(Self(seconds.saturating_mul(1000).saturating_add(nanos / 1_000_000)))
            }
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Encodes as a `{seconds, nanoseconds}` object, the shape a document
    /// store hands back for server-stamped fields.
    #[must_use]
    pub fn to_wire(&self) -> Value {
        let seconds = self.0.div_euclid(1000);
        let nanos = self.0.rem_euclid(1000) * 1_000_000;
        json!({ "seconds": seconds, "nanoseconds": nanos })
    }

    /// Next strictly later timestamp: `now`, or one past `self` when the
    /// clock has not moved.
    #[must_use]
    pub fn tick(&self) -> Self {
        let now = Self::now();
        if now > *self { now } else { Self(self.0.saturating_add(1)) }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match DateTime::<Utc>::from_timestamp_millis(self.0) {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "{}ms", self.0),
        }
    }
}

impl FromStr for Timestamp {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DateTime::parse_from_rfc3339(s.trim())
            .map(|dt| Self(dt.timestamp_millis()))
            .map_err(|e| crate::Error::InvalidTimestamp(format!("{s}: {e}")))
    }
}
