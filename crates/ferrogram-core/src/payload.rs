//! Serde helpers for platform payloads.
//!
//! Platform objects nest other objects (a message carries its chat, its sender,
//! the message it replies to). A broken nested object must not poison the
//! whole envelope, so nested fields are deserialized with [`lenient`]: the
//! value is first captured as JSON and only then converted, and a failed
//! conversion degrades the field to `None`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

/// Deserializes an optional field, mapping an unconvertible value to `None`.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Some(value) = Option::<Value>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if value.is_null() {
        return Ok(None);
    }

    match serde_json::from_value(value) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(error) => {
            debug!(
                payload_type = std::any::type_name::<T>(),
                %error,
                "Dropping malformed nested payload"
            );
            Ok(None)
        }
    }
}

/// Deserializes an optional list, dropping individual elements that fail to convert.
pub(crate) fn lenient_list<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Some(value) = Option::<Value>::deserialize(deserializer)? else {
        return Ok(None);
    };

    let items = match value {
        Value::Array(items) => items,
        Value::Null => return Ok(None),
        _ => {
            debug!(
                payload_type = std::any::type_name::<T>(),
                "Dropping non-array list payload"
            );
            return Ok(None);
        }
    };

    let parsed = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(parsed) => Some(parsed),
            Err(error) => {
                debug!(
                    payload_type = std::any::type_name::<T>(),
                    %error,
                    "Dropping malformed list element"
                );
                None
            }
        })
        .collect();
    Ok(Some(parsed))
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Inner {
        id: i64,
    }

    #[derive(Debug, Deserialize)]
    struct Outer {
        #[serde(default, deserialize_with = "lenient")]
        inner: Option<Inner>,
        #[serde(default, deserialize_with = "lenient_list")]
        items: Option<Vec<Inner>>,
    }

    #[test]
    fn test_bad_nested_value_becomes_none() {
        let outer: Outer = serde_json::from_str(r#"{"inner": {"id": "nope"}}"#).unwrap();
        assert!(outer.inner.is_none());
        assert!(outer.items.is_none());
    }

    #[test]
    fn test_good_nested_value_survives() {
        let outer: Outer = serde_json::from_str(r#"{"inner": {"id": 4}}"#).unwrap();
        assert_eq!(outer.inner, Some(Inner { id: 4 }));
    }

    #[test]
    fn test_list_drops_only_bad_elements() {
        let outer: Outer =
            serde_json::from_str(r#"{"items": [{"id": 1}, {"name": "x"}, {"id": 3}]}"#).unwrap();
        assert_eq!(outer.items, Some(vec![Inner { id: 1 }, Inner { id: 3 }]));
    }
}
