//! Serde adapter for human readable durations.
//!
//! ```ignore
//! #[derive(Deserialize)]
//! struct Settings {
//!     #[serde(with = "canary_types::duration")]
//!     delay: Duration,
//! }
//! ```

use std::time::Duration;

use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(&humantime::format_duration(*value))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(raw.trim()).map_err(D::Error::custom)
}
