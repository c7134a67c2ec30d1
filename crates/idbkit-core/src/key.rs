//! Primary keys and continuation tokens
//!
//! IndexedDB orders numbers before strings, and so does [`Key`]. A
//! [`ContinuationKey`] is the opaque, caller-owned token that resumes a cursor
//! just after the last record a batch included.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::storage::{StoreError, StoreResult};

/// A primary key value.
///
/// Variant order matters: the derived `Ord` sorts every number before every
/// string, matching the IndexedDB key comparison for the key types we accept.
///
/// Only integral numbers and strings are supported. IndexedDB also allows
/// fractional numbers, dates, binary and array keys; a store holding one of
/// those cannot be read past it, because the cursor walk reports the
/// unconvertible key as an error and ends the batch there.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Number(i64),
    Text(String),
}

impl Key {
    /// Read the key stored at `key_path` inside a record.
    ///
    /// Dotted paths (`"meta.id"`) walk nested objects. Integral numbers and
    /// strings are valid keys; anything else is `StoreError::InvalidKey`.
    pub fn from_record(record: &Value, key_path: &str) -> StoreResult<Key> {
        let mut current = record;
        for segment in key_path.split('.') {
            current = current.get(segment).ok_or_else(|| {
                StoreError::InvalidKey(format!("record has no value at key path '{}'", key_path))
            })?;
        }
        Key::from_value(current)
    }

    /// Convert a JSON scalar into a key.
    pub fn from_value(value: &Value) -> StoreResult<Key> {
        match value {
            Value::String(s) => Ok(Key::Text(s.clone())),
            Value::Number(n) => n
                .as_i64()
                .or_else(|| {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                        .map(|f| f as i64)
                })
                .map(Key::Number)
                .ok_or_else(|| StoreError::InvalidKey(format!("non-integral number key {}", n))),
            other => Err(StoreError::InvalidKey(format!(
                "unsupported key type: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Number(n) => write!(f, "{}", n),
            Key::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Key {
    fn from(n: i64) -> Self {
        Key::Number(n)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Text(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Text(s)
    }
}

const QUOTE: char = '"';

/// Opaque token naming the last record a batch included.
///
/// Serialized as a bare string so it can travel through the wire contract
/// untouched. A numeric key is its decimal form (`"20"`). A text key is its
/// own text, unless that text would read back as a number or already starts
/// with a quote; then it is JSON-quoted (`"\"20\""`), so every token resumes
/// at exactly the key it was made from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContinuationKey(String);

impl ContinuationKey {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Token for resuming after `key`.
    pub fn after(key: &Key) -> Self {
        match key {
            Key::Number(n) => Self(n.to_string()),
            Key::Text(s) if s.parse::<i64>().is_ok() || s.starts_with(QUOTE) => {
                Self(Value::String(s.clone()).to_string())
            }
            Key::Text(s) => Self(s.clone()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The key the next cursor should seek past.
    pub fn to_key(&self) -> Key {
        if let Ok(n) = self.0.parse::<i64>() {
            return Key::Number(n);
        }
        if self.0.starts_with(QUOTE) {
            if let Ok(text) = serde_json::from_str::<String>(&self.0) {
                return Key::Text(text);
            }
        }
        Key::Text(self.0.clone())
    }
}

impl fmt::Display for ContinuationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContinuationKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numbers_sort_before_text() {
        let mut keys = vec![Key::from("a"), Key::from(10), Key::from("10"), Key::from(2)];
        keys.sort();
        assert_eq!(
            keys,
            vec![Key::from(2), Key::from(10), Key::from("10"), Key::from("a")]
        );
    }

    #[test]
    fn test_from_record_nested_path() {
        let record = json!({"meta": {"id": "AS-1"}, "id": 7});
        assert_eq!(Key::from_record(&record, "id").unwrap(), Key::Number(7));
        assert_eq!(
            Key::from_record(&record, "meta.id").unwrap(),
            Key::Text("AS-1".into())
        );
    }

    #[test]
    fn test_from_record_rejects_missing_and_fractional() {
        assert!(matches!(
            Key::from_record(&json!({"name": "x"}), "id"),
            Err(StoreError::InvalidKey(_))
        ));
        assert!(matches!(
            Key::from_record(&json!({"id": 1.5}), "id"),
            Err(StoreError::InvalidKey(_))
        ));
        assert_eq!(
            Key::from_record(&json!({"id": 3.0}), "id").unwrap(),
            Key::Number(3)
        );
    }

    #[test]
    fn test_continuation_token_resumes_numeric_keys() {
        let token = ContinuationKey::after(&Key::Number(20));
        assert_eq!(token.as_str(), "20");
        assert_eq!(token.to_key(), Key::Number(20));

        let token = ContinuationKey::after(&Key::from("user-9"));
        assert_eq!(token.to_key(), Key::from("user-9"));
        assert_eq!(serde_json::to_string(&token).unwrap(), r#""user-9""#);
    }

    #[test]
    fn test_continuation_token_keeps_text_keys_textual() {
        for text in ["20", "-3", "+7", "\"quoted", "\"", "007"] {
            let key = Key::from(text);
            let token = ContinuationKey::after(&key);
            assert_eq!(token.to_key(), key, "token {:?}", token.as_str());
        }
        assert_eq!(ContinuationKey::after(&Key::from("20")).as_str(), r#""20""#);
        assert_eq!(ContinuationKey::after(&Key::Number(-3)).to_key(), Key::Number(-3));

        // A hand-written quoted token that is not valid JSON stays literal text.
        assert_eq!(ContinuationKey::new("\"open").to_key(), Key::from("\"open"));
    }
}
