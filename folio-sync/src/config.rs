//! Store configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default load window before a silent channel is reported as timed out.
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration shared by every synced store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// How long to wait for the first channel event.
    #[serde(rename = "load_timeout_ms", with = "millis")]
    pub load_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            load_timeout: DEFAULT_LOAD_TIMEOUT,
        }
    }
}

impl SyncConfig {
    /// Config with a custom load window.
    #[must_use]
    pub fn with_load_timeout(load_timeout: Duration) -> Self {
        Self { load_timeout }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
