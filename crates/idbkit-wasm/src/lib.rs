//! idbkit WASM bridge
//!
//! JSON-in, JSON-out handlers for the batch protocol, written against any
//! [`StorageEngine`] so they run natively over `MemoryEngine` and in the
//! browser over IndexedDB. The `browser` feature exports them through
//! wasm-bindgen (see `browser.rs`).
//!
//! # Wire format
//!
//! Requests and results use the batch contract field names:
//!
//! ```text
//! {"skip":0,"take":20,"typeDiscriminator":"$type","typeDiscriminatorValue":"Note","continuationKey":"20"}
//!     -> {"items":[...],"continuationKey":"40"}
//! ```
//!
//! Failures come back as `{"error":"description"}` rather than a thrown value.

#[cfg(feature = "browser")]
pub mod browser;

use idbkit_core::{BatchRequest, EngineConfig, Key, StorageEngine, StoreIdentity};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

/// Database used when `init_store` is given no name.
pub const DEFAULT_DB_NAME: &str = "idbkit";

/// Store used when `init_store` options name none.
pub const DEFAULT_STORE_NAME: &str = "items";

/// Options accepted by `init_store`, as JSON.
///
/// Every field is optional: `{}` opens the default store with the default
/// key path and lets the engine pick the version.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InitOptions {
    pub store: Option<String>,
    pub key_path: Option<String>,
    pub version: Option<u32>,
    /// Sibling stores to create in the same database.
    pub declared_stores: Vec<String>,
    pub config: EngineConfig,
}

impl InitOptions {
    /// Parse options JSON; an absent or blank string means defaults.
    pub fn from_json(json: Option<&str>) -> Result<Self, String> {
        let options: InitOptions = match json.map(str::trim) {
            None | Some("") => InitOptions::default(),
            Some(text) => serde_json::from_str(text).map_err(|e| format!("Invalid options: {}", e))?,
        };
        options.config.validate().map_err(|e| e.to_string())?;
        Ok(options)
    }

    /// Identity of the store these options open inside `database`.
    pub fn identity(&self, database: &str) -> StoreIdentity {
        let mut builder = self
            .config
            .identity(database)
            .store(self.store.as_deref().unwrap_or(DEFAULT_STORE_NAME));
        if let Some(key_path) = &self.key_path {
            builder = builder.key_path(key_path.clone());
        }
        if let Some(version) = self.version {
            builder = builder.version(version);
        }
        builder.build()
    }

    pub fn declared(&self) -> Vec<&str> {
        self.declared_stores.iter().map(String::as_str).collect()
    }
}

/// `{"error": msg}` with proper escaping.
pub fn error_json(msg: &str) -> String {
    json!({ "error": msg }).to_string()
}

/// Serve one `get-batch` call from a JSON request.
///
/// A blank request means "first batch, default window". The result always
/// carries `continuationKey`, `null` once the chain is exhausted.
pub async fn get_batch_json(
    engine: &dyn StorageEngine,
    identity: &StoreIdentity,
    request_json: &str,
) -> String {
    let request: BatchRequest = if request_json.trim().is_empty() {
        BatchRequest::new()
    } else {
        match serde_json::from_str(request_json) {
            Ok(request) => request,
            Err(e) => return error_json(&format!("Invalid batch request: {}", e)),
        }
    };

    let result = engine.get_batch(identity, &request).await;
    match serde_json::to_string(&result) {
        Ok(json) => json,
        Err(e) => error_json(&format!("serialization failed: {}", e)),
    }
}

/// Upsert one serialized record. Returns `{"stored":bool}` or an error.
pub async fn store_item_json(
    engine: &dyn StorageEngine,
    identity: &StoreIdentity,
    item_json: &str,
) -> String {
    let item: Value = match serde_json::from_str(item_json) {
        Ok(item) => item,
        Err(e) => return error_json(&format!("Invalid JSON: {}", e)),
    };
    if let Err(e) = Key::from_record(&item, identity.key_path()) {
        return error_json(&e.to_string());
    }

    let stored = engine.store_item(identity, item_json).await;
    debug!(store = identity.store(), stored, "store_item_json");
    json!({ "stored": stored }).to_string()
}

/// Parse a key given as JSON (`7` or `"abc"`); bare text is a text key.
pub fn parse_key(key_json: &str) -> Result<Key, String> {
    match serde_json::from_str::<Value>(key_json) {
        Ok(value) => Key::from_value(&value).map_err(|e| e.to_string()),
        Err(_) => Ok(Key::Text(key_json.to_string())),
    }
}

/// Fetch one record: its JSON, `null` when absent, or an error.
pub async fn get_item_json(
    engine: &dyn StorageEngine,
    identity: &StoreIdentity,
    key_json: &str,
) -> String {
    let key = match parse_key(key_json) {
        Ok(key) => key,
        Err(e) => return error_json(&e),
    };
    match engine.get(identity, &key).await {
        Ok(Some(item)) => item.to_string(),
        Ok(None) => Value::Null.to_string(),
        Err(e) => error_json(&e.to_string()),
    }
}

/// Crate version, e.g. `"0.1.0"`.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;
    use idbkit_core::MemoryEngine;
    use pretty_assertions::assert_eq;

    async fn seeded(count: i64) -> (MemoryEngine, StoreIdentity) {
        let identity = StoreIdentity::new("notes");
        let engine = MemoryEngine::with_records(
            &identity,
            (1..=count).map(|id| json!({"id": id, "$type": if id % 2 == 0 { "Even" } else { "Odd" }})),
        )
        .unwrap();
        (engine, identity)
    }

    fn parse(json: &str) -> Value {
        serde_json::from_str(json).unwrap()
    }

    #[tokio::test]
    async fn test_get_batch_json_chain() {
        let (engine, identity) = seeded(25).await;

        let first = parse(&get_batch_json(&engine, &identity, r#"{"take":20}"#).await);
        assert_eq!(first["items"].as_array().unwrap().len(), 20);
        assert_eq!(first["continuationKey"], "20");

        let second =
            parse(&get_batch_json(&engine, &identity, r#"{"continuationKey":"20"}"#).await);
        assert_eq!(second["items"].as_array().unwrap().len(), 5);
        assert_eq!(second["continuationKey"], Value::Null);
    }

    #[tokio::test]
    async fn test_get_batch_json_discriminator() {
        let (engine, identity) = seeded(6).await;
        let request = r#"{"typeDiscriminator":"$type","typeDiscriminatorValue":"Even"}"#;

        let result = parse(&get_batch_json(&engine, &identity, request).await);
        let ids: Vec<i64> = result["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![2, 4, 6]);
    }

    #[tokio::test]
    async fn test_get_batch_json_rejects_bad_request() {
        let (engine, identity) = seeded(1).await;

        let result = parse(&get_batch_json(&engine, &identity, r#"{"take":-1}"#).await);
        assert!(result["error"].as_str().unwrap().starts_with("Invalid batch request"));

        let blank = parse(&get_batch_json(&engine, &identity, "  ").await);
        assert_eq!(blank["items"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_store_and_get_item_json() {
        let (engine, identity) = seeded(0).await;

        let stored = store_item_json(&engine, &identity, r#"{"id":"a","text":"hi \"there\""}"#).await;
        assert_eq!(parse(&stored), json!({"stored": true}));

        let item = get_item_json(&engine, &identity, r#""a""#).await;
        assert_eq!(parse(&item), json!({"id": "a", "text": "hi \"there\""}));
        assert_eq!(get_item_json(&engine, &identity, "a").await, item);
        assert_eq!(get_item_json(&engine, &identity, "42").await, "null");

        let missing_key = parse(&store_item_json(&engine, &identity, r#"{"text":"x"}"#).await);
        assert!(missing_key["error"].is_string());
        let broken = parse(&store_item_json(&engine, &identity, "{").await);
        assert!(broken["error"].as_str().unwrap().starts_with("Invalid JSON"));
    }

    #[tokio::test]
    async fn test_errors_surface_as_json() {
        let (engine, identity) = seeded(1).await;
        engine.set_available(false);

        let result = parse(&get_item_json(&engine, &identity, "1").await);
        assert!(result["error"].is_string());

        // The batch path never fails; an unreachable store reads as exhausted.
        let batch = parse(&get_batch_json(&engine, &identity, "{}").await);
        assert_eq!(batch, json!({"items": [], "continuationKey": null}));
    }

    #[test]
    fn test_init_options() {
        let defaults = InitOptions::from_json(None).unwrap();
        let identity = defaults.identity("app");
        assert_eq!(identity.store(), DEFAULT_STORE_NAME);
        assert_eq!(identity.key_path(), "id");
        assert_eq!(identity.version(), None);

        let options = InitOptions::from_json(Some(
            r#"{"store":"users","keyPath":"uuid","version":3,"declaredStores":["logs"],"config":{"batchCeiling":50}}"#,
        ))
        .unwrap();
        let identity = options.identity("app");
        assert_eq!(identity.store(), "users");
        assert_eq!(identity.key_path(), "uuid");
        assert_eq!(identity.version(), Some(3));
        assert_eq!(options.declared(), vec!["logs"]);
        assert_eq!(options.config.batch_ceiling, 50);

        assert!(InitOptions::from_json(Some(r#"{"config":{"batchCeiling":0}}"#)).is_err());
        assert!(InitOptions::from_json(Some("nope")).is_err());
    }

    #[test]
    fn test_error_json_escapes() {
        assert_eq!(error_json(r#"bad "quote""#), r#"{"error":"bad \"quote\""}"#);
    }
}
