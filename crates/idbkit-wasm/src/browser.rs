//! Browser WASM bindings using wasm-bindgen and IndexedDB storage
//!
//! One store is opened by [`init_store`] and kept for the life of the page.
//! Every other export works on that store and speaks the same JSON as the
//! native handlers in the crate root.

use std::cell::RefCell;
use std::rc::Rc;

use idbkit_core::{Store, StorageEngine};
use idbkit_indexeddb::IndexedDbEngine;
use wasm_bindgen::prelude::*;

use crate::{InitOptions, DEFAULT_DB_NAME};

thread_local! {
    static STORE: RefCell<Option<Store>> = const { RefCell::new(None) };
}

fn js_error<E: std::fmt::Display>(msg: E) -> JsValue {
    JsValue::from_str(&msg.to_string())
}

/// Open (or create) the IndexedDB store. Must be called before any other
/// storage export.
///
/// `options_json` is optional, e.g.
/// `{"store":"notes","keyPath":"id","declaredStores":["tags"],"config":{"batchCeiling":20}}`.
#[wasm_bindgen]
pub async fn init_store(db_name: Option<String>, options_json: Option<String>) -> Result<(), JsValue> {
    // Route Rust panics to console.error instead of "RuntimeError: unreachable"
    console_error_panic_hook::set_once();

    if is_store_initialized() {
        return Err(js_error("Store already initialized"));
    }

    let options = InitOptions::from_json(options_json.as_deref()).map_err(js_error)?;
    let name = db_name.unwrap_or_else(|| DEFAULT_DB_NAME.to_string());
    let identity = options.identity(&name);

    let engine: Rc<dyn StorageEngine> = Rc::new(IndexedDbEngine::with_config(options.config.clone()));
    engine
        .open(&identity, &options.declared())
        .await
        .map_err(|e| js_error(format!("Failed to open IndexedDB: {}", e)))?;

    STORE.with(|slot| {
        *slot.borrow_mut() = Some(Store::new(engine, identity));
    });
    Ok(())
}

fn current_store() -> Result<Store, JsValue> {
    STORE.with(|slot| {
        slot.borrow()
            .clone()
            .ok_or_else(|| js_error("Store not initialized. Call init_store() first."))
    })
}

/// One batch of the continuation protocol.
///
/// Returns `{"items":[...],"continuationKey":...}` or `{"error":...}`.
#[wasm_bindgen]
pub async fn get_batch(request_json: &str) -> Result<String, JsValue> {
    let store = current_store()?;
    Ok(crate::get_batch_json(store.engine().as_ref(), store.identity(), request_json).await)
}

/// Upsert a record given as JSON. Returns `{"stored":bool}` or `{"error":...}`.
#[wasm_bindgen]
pub async fn store_item(item_json: &str) -> Result<String, JsValue> {
    let store = current_store()?;
    Ok(crate::store_item_json(store.engine().as_ref(), store.identity(), item_json).await)
}

/// Record JSON for a key (`7`, `"abc"` or bare text), `null` if absent.
#[wasm_bindgen]
pub async fn get_item(key_json: &str) -> Result<String, JsValue> {
    let store = current_store()?;
    Ok(crate::get_item_json(store.engine().as_ref(), store.identity(), key_json).await)
}

/// Delete a record by key. Resolves to `true` even when nothing was stored.
#[wasm_bindgen]
pub async fn delete_item(key_json: &str) -> Result<bool, JsValue> {
    let store = current_store()?;
    let key = crate::parse_key(key_json).map_err(js_error)?;
    store.delete(key).await.map_err(js_error)
}

#[wasm_bindgen]
pub async fn count_items() -> Result<u32, JsValue> {
    let store = current_store()?;
    let count = store.count().await.map_err(js_error)?;
    Ok(count as u32)
}

#[wasm_bindgen]
pub async fn clear_store() -> Result<(), JsValue> {
    current_store()?.clear().await.map_err(js_error)
}

/// Delete the whole database and forget the store; `init_store` may be
/// called again afterwards.
#[wasm_bindgen]
pub async fn delete_database() -> Result<(), JsValue> {
    let store = current_store()?;
    store.delete_database().await.map_err(js_error)?;
    STORE.with(|slot| slot.borrow_mut().take());
    Ok(())
}

/// Get the idbkit-wasm version.
#[wasm_bindgen]
pub fn version() -> String {
    crate::version().to_string()
}

/// Check if the store is initialized.
#[wasm_bindgen]
pub fn is_store_initialized() -> bool {
    STORE.with(|slot| slot.borrow().is_some())
}
