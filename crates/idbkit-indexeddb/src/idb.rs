//! Low-level IndexedDB helpers using web-sys
//!
//! IndexedDB reports outcomes through events. Each helper here arms one-shot
//! handlers on a request or transaction and exposes the outcome as a
//! `JsFuture`, so the engine can be written with plain `async`/`await`.

use std::cell::RefCell;
use std::rc::Rc;

use idbkit_core::logging::prefix;
use js_sys::Promise;
use tracing::{debug, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    Event, IdbDatabase, IdbFactory, IdbKeyRange, IdbObjectStore, IdbObjectStoreParameters,
    IdbOpenDbRequest, IdbRequest, IdbTransaction, IdbTransactionMode, IdbVersionChangeEvent,
};

use crate::error::{describe, IndexedDbError, Result};

type EventHandler = Closure<dyn FnMut(Event)>;

/// Handler pair kept alive until either side fires.
type HandlerSlot = Rc<RefCell<Option<(EventHandler, EventHandler)>>>;

/// Get the global IndexedDB factory (window or worker scope).
pub fn idb_factory() -> Result<IdbFactory> {
    let global = js_sys::global();

    let idb = js_sys::Reflect::get(&global, &"indexedDB".into())
        .map_err(|_| IndexedDbError::NotAvailable("no indexedDB on global".into()))?;

    if idb.is_undefined() || idb.is_null() {
        return Err(IndexedDbError::NotAvailable(
            "indexedDB is null/undefined".into(),
        ));
    }

    idb.dyn_into::<IdbFactory>()
        .map_err(|_| IndexedDbError::NotAvailable("indexedDB is not IdbFactory".into()))
}

/// Promise settled by the next `success`/`error` event on `req`.
///
/// Arming again overwrites the previous handlers. A cursor request fires
/// `success` once per `continue()`, so it is re-armed before every step.
fn request_outcome(req: &IdbRequest) -> Promise {
    let req = req.clone();
    Promise::new(&mut |resolve, reject| {
        let slot: HandlerSlot = Rc::new(RefCell::new(None));

        let on_success = {
            let req = req.clone();
            let slot = Rc::clone(&slot);
            Closure::wrap(Box::new(move |_: Event| {
                let result = req.result().unwrap_or(JsValue::UNDEFINED);
                let _ = resolve.call1(&JsValue::UNDEFINED, &result);
                slot.borrow_mut().take();
            }) as Box<dyn FnMut(Event)>)
        };

        let on_error = {
            let req = req.clone();
            let slot = Rc::clone(&slot);
            Closure::wrap(Box::new(move |_: Event| {
                let reason = match req.error() {
                    Ok(Some(exception)) => JsValue::from(exception.message()),
                    _ => JsValue::from_str("unknown IDB request error"),
                };
                let _ = reject.call1(&JsValue::UNDEFINED, &reason);
                slot.borrow_mut().take();
            }) as Box<dyn FnMut(Event)>)
        };

        req.set_onsuccess(Some(on_success.as_ref().unchecked_ref()));
        req.set_onerror(Some(on_error.as_ref().unchecked_ref()));
        *slot.borrow_mut() = Some((on_success, on_error));
    })
}

/// Promise settled when `tx` completes or fails.
fn transaction_outcome(tx: &IdbTransaction) -> Promise {
    let tx = tx.clone();
    Promise::new(&mut |resolve, reject| {
        let slot: HandlerSlot = Rc::new(RefCell::new(None));

        let on_complete = {
            let slot = Rc::clone(&slot);
            Closure::wrap(Box::new(move |_: Event| {
                let _ = resolve.call0(&JsValue::UNDEFINED);
                slot.borrow_mut().take();
            }) as Box<dyn FnMut(Event)>)
        };

        let on_error = {
            let tx = tx.clone();
            let slot = Rc::clone(&slot);
            Closure::wrap(Box::new(move |_: Event| {
                let reason = tx
                    .error()
                    .map(|exception| JsValue::from(exception.message()))
                    .unwrap_or_else(|| JsValue::from_str("transaction error"));
                let _ = reject.call1(&JsValue::UNDEFINED, &reason);
                slot.borrow_mut().take();
            }) as Box<dyn FnMut(Event)>)
        };

        tx.set_oncomplete(Some(on_complete.as_ref().unchecked_ref()));
        tx.set_onerror(Some(on_error.as_ref().unchecked_ref()));
        *slot.borrow_mut() = Some((on_complete, on_error));
    })
}

/// Open `name` so that every store in `stores` exists.
///
/// Creating a store needs a version change. With no `pinned` version the
/// database is reopened one version past its current one so the upgrade can
/// run; with a pinned version a missing store is an error.
pub async fn open_database(
    name: &str,
    pinned: Option<u32>,
    stores: &[String],
    key_path: &str,
) -> Result<IdbDatabase> {
    let db = open_at(name, pinned, stores, key_path).await?;
    let missing = missing_stores(&db, stores);
    if missing.is_empty() {
        return Ok(db);
    }

    if let Some(version) = pinned {
        db.close();
        return Err(IndexedDbError::Open(format!(
            "stores {:?} missing from {} at pinned version {}",
            missing, name, version
        )));
    }

    let next = db.version() as u32 + 1;
    db.close();
    debug!(
        database = name,
        version = next,
        stores = ?missing,
        "{} bumping version to create stores",
        prefix::DB
    );
    open_at(name, Some(next), stores, key_path).await
}

fn missing_stores(db: &IdbDatabase, stores: &[String]) -> Vec<String> {
    let existing = db.object_store_names();
    stores
        .iter()
        .filter(|store| !existing.contains(store))
        .cloned()
        .collect()
}

async fn open_at(
    name: &str,
    version: Option<u32>,
    stores: &[String],
    key_path: &str,
) -> Result<IdbDatabase> {
    let factory = idb_factory()?;
    let request: IdbOpenDbRequest = match version {
        Some(version) => factory.open_with_u32(name, version),
        None => factory.open(name),
    }
    .map_err(|e| IndexedDbError::Open(describe(&e)))?;

    let wanted = stores.to_vec();
    let key_path = key_path.to_string();
    let on_upgrade = Closure::wrap(Box::new(move |event: IdbVersionChangeEvent| {
        if let Err(err) = create_missing_stores(&event, &wanted, &key_path) {
            warn!(error = %err, "{} upgrade could not create stores", prefix::DB);
        }
    }) as Box<dyn FnMut(IdbVersionChangeEvent)>);
    request.set_onupgradeneeded(Some(on_upgrade.as_ref().unchecked_ref()));

    let opened = JsFuture::from(request_outcome(request.unchecked_ref())).await;
    request.set_onupgradeneeded(None);
    drop(on_upgrade);

    opened
        .map_err(|e| IndexedDbError::Open(describe(&e)))?
        .dyn_into::<IdbDatabase>()
        .map_err(|_| IndexedDbError::Open("open result is not an IDBDatabase".into()))
}

/// Runs inside `onupgradeneeded`, the only place stores can be created.
fn create_missing_stores(
    event: &IdbVersionChangeEvent,
    wanted: &[String],
    key_path: &str,
) -> Result<()> {
    let request: IdbOpenDbRequest = event
        .target()
        .ok_or_else(|| IndexedDbError::Open("upgrade event has no target".into()))?
        .unchecked_into();
    let db: IdbDatabase = request.result()?.unchecked_into();

    let existing = db.object_store_names();
    for store in wanted.iter().filter(|store| !existing.contains(store)) {
        let params = IdbObjectStoreParameters::new();
        js_sys::Reflect::set(&params, &"keyPath".into(), &JsValue::from_str(key_path))?;
        db.create_object_store_with_optional_parameters(store, &params)?;
        debug!(store = store.as_str(), key_path, "{} created object store", prefix::DB);
    }
    Ok(())
}

/// Start a transaction scoped to one object store.
pub fn begin_transaction(
    db: &IdbDatabase,
    store: &str,
    mode: IdbTransactionMode,
) -> Result<(IdbTransaction, IdbObjectStore)> {
    let tx = db
        .transaction_with_str_and_mode(store, mode)
        .map_err(|e| IndexedDbError::Transaction(describe(&e)))?;
    let object_store = tx
        .object_store(store)
        .map_err(|e| IndexedDbError::Request(describe(&e)))?;
    Ok((tx, object_store))
}

/// Open a forward cursor, starting strictly after `after` when given.
pub fn open_cursor_after(store: &IdbObjectStore, after: Option<&JsValue>) -> Result<IdbRequest> {
    let request = match after {
        Some(key) => {
            let range = IdbKeyRange::lower_bound_with_open(key, true)
                .map_err(|e| IndexedDbError::Request(describe(&e)))?;
            store.open_cursor_with_range(&range)
        }
        None => store.open_cursor(),
    };
    request.map_err(|e| IndexedDbError::Request(describe(&e)))
}

/// Await the next outcome of `req`, resolving to its result.
pub async fn await_request(req: &IdbRequest) -> Result<JsValue> {
    JsFuture::from(request_outcome(req))
        .await
        .map_err(|e| IndexedDbError::Request(describe(&e)))
}

/// Await an IdbTransaction to complete.
pub async fn await_transaction(tx: &IdbTransaction) -> Result<()> {
    JsFuture::from(transaction_outcome(tx))
        .await
        .map_err(|e| IndexedDbError::Transaction(describe(&e)))?;
    Ok(())
}

/// Delete an IndexedDB database by name.
pub async fn delete_database(name: &str) -> Result<()> {
    let factory = idb_factory()?;
    let request = factory
        .delete_database(name)
        .map_err(|e| IndexedDbError::Open(format!("delete db: {}", describe(&e))))?;
    JsFuture::from(request_outcome(request.unchecked_ref()))
        .await
        .map_err(|e| IndexedDbError::Open(format!("delete db: {}", describe(&e))))?;
    Ok(())
}
