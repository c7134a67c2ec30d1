//! Conversions across the JS boundary
//!
//! Records cross as JSON text (`JSON.stringify` / `JSON.parse`), keys as JS
//! numbers or strings.

use idbkit_core::Key;
use serde_json::Value;
use wasm_bindgen::JsValue;

use crate::error::{describe, IndexedDbError, Result};

/// Largest integer a JS number holds exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

pub fn key_to_js(key: &Key) -> JsValue {
    match key {
        Key::Number(n) => JsValue::from_f64(*n as f64),
        Key::Text(s) => JsValue::from_str(s),
    }
}

/// Strings and safe integers only; any other IndexedDB key is an error.
pub fn js_to_key(value: &JsValue) -> Result<Key> {
    if let Some(text) = value.as_string() {
        return Ok(Key::Text(text));
    }
    match value.as_f64() {
        Some(n) if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER => Ok(Key::Number(n as i64)),
        _ => Err(IndexedDbError::JsValue(format!(
            "unsupported primary key {}",
            describe(value)
        ))),
    }
}

/// Read a JS record back as JSON.
pub fn js_to_value(value: &JsValue) -> Result<Value> {
    if value.is_undefined() {
        return Ok(Value::Null);
    }
    let text: String = js_sys::JSON::stringify(value)
        .map_err(|e| IndexedDbError::JsValue(describe(&e)))?
        .into();
    Ok(serde_json::from_str(&text)?)
}

/// Parse serialized JSON into a JS value ready to store.
pub fn parse_record(serialized: &str) -> Result<JsValue> {
    js_sys::JSON::parse(serialized).map_err(|e| IndexedDbError::JsValue(describe(&e)))
}
