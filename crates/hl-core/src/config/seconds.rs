//! Durations written as whole seconds
//!
//! Used with `#[serde(with = "seconds")]` on `Duration` fields so the TOML
//! file reads `backend_timeout = 30` rather than a table of secs and nanos.
//! Sub-second parts are dropped on write.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

pub(crate) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_secs())
}

pub(crate) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_secs)
}
