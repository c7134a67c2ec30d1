//! Error types for the IndexedDB engine

use idbkit_core::StoreError;
use thiserror::Error;

/// Result type for IndexedDB operations
pub type Result<T> = std::result::Result<T, IndexedDbError>;

/// Errors raised at the IndexedDB boundary
#[derive(Debug, Error)]
pub enum IndexedDbError {
    /// IndexedDB is not available in this environment
    #[error("IndexedDB not available: {0}")]
    NotAvailable(String),

    /// Database open/upgrade error
    #[error("IndexedDB open error: {0}")]
    Open(String),

    /// Transaction error
    #[error("IndexedDB transaction error: {0}")]
    Transaction(String),

    /// Request error from IDB operation
    #[error("IndexedDB request error: {0}")]
    Request(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A JS value could not be converted (key, record, result)
    #[error("JS conversion error: {0}")]
    JsValue(String),
}

impl From<wasm_bindgen::JsValue> for IndexedDbError {
    fn from(val: wasm_bindgen::JsValue) -> Self {
        IndexedDbError::Request(describe(&val))
    }
}

/// Best-effort text for a thrown JS value (DOMException, string, object).
pub(crate) fn describe(val: &wasm_bindgen::JsValue) -> String {
    if let Some(text) = val.as_string() {
        return text;
    }
    js_sys::JSON::stringify(val)
        .map(String::from)
        .unwrap_or_else(|_| format!("{:?}", val))
}

impl From<IndexedDbError> for StoreError {
    fn from(err: IndexedDbError) -> Self {
        match err {
            IndexedDbError::NotAvailable(msg) => StoreError::StorageUnavailable(msg),
            IndexedDbError::Json(e) => StoreError::Serialization(e.to_string()),
            IndexedDbError::JsValue(msg) => StoreError::InvalidData(msg),
            IndexedDbError::Open(msg) => StoreError::Backend(format!("IndexedDB open: {}", msg)),
            IndexedDbError::Transaction(msg) => {
                StoreError::Backend(format!("IndexedDB transaction: {}", msg))
            }
            IndexedDbError::Request(msg) => {
                StoreError::Backend(format!("IndexedDB request: {}", msg))
            }
        }
    }
}
