//! `StorageEngine` over the browser's IndexedDB.

use std::cell::RefCell;
use std::collections::HashMap;

use async_trait::async_trait;
use idbkit_core::logging::prefix;
use idbkit_core::storage::BoxedCursor;
use idbkit_core::{
    EngineConfig, Key, Record, RecordCursor, StorageEngine, StoreError, StoreIdentity,
    StoreResult,
};
use serde_json::Value;
use tracing::{debug, info, warn};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{
    IdbCursorWithValue, IdbDatabase, IdbObjectStore, IdbRequest, IdbTransaction,
    IdbTransactionMode,
};

use crate::convert::{js_to_key, js_to_value, key_to_js, parse_record};
use crate::error::{IndexedDbError, Result};
use crate::idb;

/// IndexedDB-backed storage engine.
///
/// Keeps one open connection per database name. Every call runs in its own
/// short transaction; nothing is held between `get-batch` calls, so cursors
/// are reopened from the continuation key each time.
///
/// Single-threaded like the browser event loop it runs on.
pub struct IndexedDbEngine {
    config: EngineConfig,
    connections: RefCell<HashMap<String, IdbDatabase>>,
}

impl Default for IndexedDbEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexedDbEngine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            connections: RefCell::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether this environment exposes `indexedDB` at all.
    pub fn is_available() -> bool {
        idb::idb_factory().is_ok()
    }

    /// Close every cached connection.
    pub fn close_all(&self) {
        for (_, db) in self.connections.borrow_mut().drain() {
            db.close();
        }
    }

    fn cached(&self, database: &str) -> Option<IdbDatabase> {
        self.connections.borrow().get(database).cloned()
    }

    fn forget(&self, database: &str) {
        if let Some(db) = self.connections.borrow_mut().remove(database) {
            db.close();
        }
    }

    /// Connection on which the identity's store and `declared` all exist.
    ///
    /// A cached connection that lacks a store, or sits at a different pinned
    /// version, is closed first so the version change is not blocked.
    async fn connect(&self, identity: &StoreIdentity, declared: &[&str]) -> Result<IdbDatabase> {
        let mut wanted = vec![identity.store().to_string()];
        wanted.extend(
            declared
                .iter()
                .filter(|store| **store != identity.store())
                .map(|store| store.to_string()),
        );

        if let Some(db) = self.cached(identity.database()) {
            let names = db.object_store_names();
            let version_ok = identity
                .version()
                .map_or(true, |version| db.version() as u32 == version);
            if version_ok && wanted.iter().all(|store| names.contains(store)) {
                return Ok(db);
            }
            self.forget(identity.database());
        }

        let db = idb::open_database(
            identity.database(),
            identity.version(),
            &wanted,
            identity.key_path(),
        )
        .await?;
        info!(
            database = identity.database(),
            version = db.version() as u32,
            "{} opened IndexedDB",
            prefix::DB
        );
        self.connections
            .borrow_mut()
            .insert(identity.database().to_string(), db.clone());
        Ok(db)
    }

    /// Run one request against the identity's store and wait for its
    /// transaction to commit.
    async fn request(
        &self,
        identity: &StoreIdentity,
        mode: IdbTransactionMode,
        op: impl FnOnce(&IdbObjectStore) -> std::result::Result<IdbRequest, JsValue>,
    ) -> Result<JsValue> {
        let db = self.connect(identity, &[]).await?;
        let (tx, store) = idb::begin_transaction(&db, identity.store(), mode)?;
        let request = op(&store)?;
        let result = idb::await_request(&request).await?;
        idb::await_transaction(&tx).await?;
        Ok(result)
    }
}

#[async_trait(?Send)]
impl StorageEngine for IndexedDbEngine {
    async fn open(&self, identity: &StoreIdentity, declared_stores: &[&str]) -> StoreResult<()> {
        self.connect(identity, declared_stores).await?;
        Ok(())
    }

    async fn clear(&self, identity: &StoreIdentity) -> StoreResult<()> {
        self.request(identity, IdbTransactionMode::Readwrite, |store| {
            store.clear()
        })
        .await?;
        Ok(())
    }

    async fn count(&self, identity: &StoreIdentity) -> StoreResult<usize> {
        let result = self
            .request(identity, IdbTransactionMode::Readonly, |store| store.count())
            .await?;
        result
            .as_f64()
            .map(|n| n as usize)
            .ok_or_else(|| StoreError::InvalidData("count result is not a number".into()))
    }

    async fn delete_database(&self, name: &str) -> StoreResult<()> {
        self.forget(name);
        idb::delete_database(name).await?;
        debug!(database = name, "{} deleted database", prefix::DB);
        Ok(())
    }

    async fn delete(&self, identity: &StoreIdentity, key: &Key) -> StoreResult<bool> {
        let js_key = key_to_js(key);
        self.request(identity, IdbTransactionMode::Readwrite, |store| {
            store.delete(&js_key)
        })
        .await?;
        Ok(true)
    }

    async fn get(&self, identity: &StoreIdentity, key: &Key) -> StoreResult<Option<Value>> {
        let js_key = key_to_js(key);
        let result = self
            .request(identity, IdbTransactionMode::Readonly, |store| {
                store.get(&js_key)
            })
            .await?;
        if result.is_undefined() || result.is_null() {
            return Ok(None);
        }
        Ok(Some(js_to_value(&result)?))
    }

    async fn get_all(&self, identity: &StoreIdentity) -> StoreResult<Vec<Value>> {
        let result = self
            .request(identity, IdbTransactionMode::Readonly, |store| {
                store.get_all()
            })
            .await?;
        let array = js_sys::Array::from(&result);
        let mut values = Vec::with_capacity(array.length() as usize);
        for item in array.iter() {
            values.push(js_to_value(&item)?);
        }
        Ok(values)
    }

    async fn store_item(&self, identity: &StoreIdentity, serialized: &str) -> bool {
        let record = match parse_record(serialized) {
            Ok(record) => record,
            Err(err) => {
                warn!(store = identity.store(), error = %err, "{} rejected unparsable item", prefix::DB);
                return false;
            }
        };
        match self
            .request(identity, IdbTransactionMode::Readwrite, |store| {
                store.put(&record)
            })
            .await
        {
            Ok(_) => true,
            Err(err) => {
                warn!(store = identity.store(), error = %err, "{} failed to store item", prefix::DB);
                false
            }
        }
    }

    async fn open_cursor<'a>(
        &'a self,
        identity: &'a StoreIdentity,
        after: Option<&'a Key>,
    ) -> StoreResult<BoxedCursor<'a>> {
        let db = self.connect(identity, &[]).await?;
        let (tx, store) =
            idb::begin_transaction(&db, identity.store(), IdbTransactionMode::Readonly)?;
        let lower = after.map(key_to_js);
        let request = idb::open_cursor_after(&store, lower.as_ref())?;
        Ok(Box::new(IdbRecordCursor {
            request,
            _tx: tx,
            current: None,
            started: false,
        }))
    }

    fn batch_ceiling(&self) -> usize {
        self.config.batch_ceiling
    }
}

/// Forward cursor over one readonly transaction.
///
/// The first read awaits the open request itself; each later read calls
/// `continue()` and awaits the same request's next `success`.
pub struct IdbRecordCursor {
    request: IdbRequest,
    _tx: IdbTransaction,
    current: Option<IdbCursorWithValue>,
    started: bool,
}

#[async_trait(?Send)]
impl RecordCursor for IdbRecordCursor {
    async fn next_record(&mut self) -> StoreResult<Option<Record>> {
        if self.started {
            let Some(cursor) = self.current.take() else {
                return Ok(None);
            };
            cursor.continue_().map_err(IndexedDbError::from)?;
        }
        self.started = true;

        let result = idb::await_request(&self.request).await?;
        if result.is_null() || result.is_undefined() {
            return Ok(None);
        }

        let cursor: IdbCursorWithValue = result.dyn_into().map_err(|_| {
            IndexedDbError::JsValue("cursor result is not an IDBCursorWithValue".into())
        })?;
        let key = js_to_key(&cursor.primary_key().map_err(IndexedDbError::from)?)?;
        let value = js_to_value(&cursor.value().map_err(IndexedDbError::from)?)?;
        self.current = Some(cursor);
        Ok(Some(Record { key, value }))
    }
}
