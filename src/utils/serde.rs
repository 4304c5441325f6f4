/*!
 * Serde utilities for common serialization/deserialization patterns.
 *
 * The canonicalization helper here backs the default unique-key generator:
 * identical arguments must always produce identical bytes, or the dedup
 * invariant silently breaks.
 */

use serde::Serialize;
use serde_json::Value;

/// Serialize a JSON value to its canonical compact string form.
///
/// Objects serialize with keys in sorted order (`serde_json::Map` is a
/// `BTreeMap` unless the `preserve_order` feature is enabled, which this
/// crate does not), so two values that are structurally equal render to the
/// same string regardless of construction order.
pub fn canonical_json(value: &Value) -> serde_json::Result<String> {
    serde_json::to_string(value)
}

/// Canonicalize any serializable payload by round-tripping it through
/// [`Value`] first, normalizing map ordering along the way.
pub fn canonical_payload<T: Serialize>(payload: &T) -> serde_json::Result<String> {
    let value = serde_json::to_value(payload)?;
    canonical_json(&value)
}

/// Serde helpers for optional durations expressed as whole seconds, the way
/// dispatch options and queue payloads carry them.
pub mod duration_secs_opt {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(duration) => serializer.serialize_some(&duration.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs: Option<u64> = Option::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
