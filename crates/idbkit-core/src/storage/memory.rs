//! In-memory storage backend
//!
//! A `BTreeMap`-per-store implementation of [`StorageEngine`] with the same
//! open/create and cursor semantics as IndexedDB. Used for native callers and
//! for exercising the batch protocol in tests.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::identity::StoreIdentity;
use crate::key::Key;
use crate::logging::prefix;
use crate::storage::error::{StoreError, StoreResult};
use crate::storage::traits::{BoxedCursor, Record, RecordCursor, StorageEngine};

const NO_FAULT: usize = usize::MAX;

#[derive(Debug, Default)]
struct Database {
    version: u32,
    stores: HashMap<String, ObjectStore>,
}

#[derive(Debug)]
struct ObjectStore {
    key_path: String,
    records: BTreeMap<Key, Value>,
}

type Databases = Arc<RwLock<HashMap<String, Database>>>;

/// In-memory object store engine.
///
/// Stores are addressed by (database, store name); as in IndexedDB, the schema
/// version only matters when opening. Useful for:
/// - Unit and integration testing of the batch protocol
/// - Native processes that want the query layer without a browser
#[derive(Debug)]
pub struct MemoryEngine {
    databases: Databases,
    config: EngineConfig,
    unavailable: AtomicBool,
    fail_cursor_after: Arc<AtomicUsize>,
}

impl MemoryEngine {
    /// Create a new empty engine with default configuration.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            databases: Arc::new(RwLock::new(HashMap::new())),
            config,
            unavailable: AtomicBool::new(false),
            fail_cursor_after: Arc::new(AtomicUsize::new(NO_FAULT)),
        }
    }

    /// Create an engine whose store `identity` already holds `records`.
    pub fn with_records(
        identity: &StoreIdentity,
        records: impl IntoIterator<Item = Value>,
    ) -> StoreResult<Self> {
        let engine = Self::new();
        engine.create_stores(identity, &[])?;
        {
            let mut databases = engine.databases.write();
            let store = object_store_mut(&mut databases, identity)?;
            for record in records {
                let key = Key::from_record(&record, &store.key_path)?;
                store.records.insert(key, record);
            }
        }
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Simulate a missing storage boundary (for testing).
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Make every cursor opened from now on fail after `reads` successful
    /// reads (for testing).
    pub fn fail_cursor_after(&self, reads: usize) {
        self.fail_cursor_after.store(reads, Ordering::SeqCst);
    }

    /// Current schema version of `database`, if it exists.
    pub fn version(&self, database: &str) -> Option<u32> {
        self.databases.read().get(database).map(|db| db.version)
    }

    fn ensure_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::StorageUnavailable(
                "memory engine marked unavailable".into(),
            ));
        }
        Ok(())
    }

    fn create_stores(&self, identity: &StoreIdentity, declared_stores: &[&str]) -> StoreResult<()> {
        let mut databases = self.databases.write();
        let db = databases.entry(identity.database().to_string()).or_default();

        if let Some(requested) = identity.version() {
            if requested < db.version {
                return Err(StoreError::Backend(format!(
                    "database '{}' is at version {}, cannot open at {}",
                    identity.database(),
                    db.version,
                    requested
                )));
            }
        }

        let missing: Vec<&str> = std::iter::once(identity.store())
            .chain(declared_stores.iter().copied())
            .filter(|name| !db.stores.contains_key(*name))
            .collect();

        if identity.version() == Some(db.version) && !missing.is_empty() {
            return Err(StoreError::Backend(format!(
                "stores {:?} missing from '{}' at pinned version {}",
                missing,
                identity.database(),
                db.version
            )));
        }

        let target = match identity.version() {
            Some(requested) => requested,
            None if !missing.is_empty() || db.version == 0 => db.version + 1,
            None => db.version,
        };
        if target > db.version {
            debug!(
                database = identity.database(),
                from = db.version,
                to = target,
                "{} upgrading database",
                prefix::DB
            );
            db.version = target;
        }

        for name in missing {
            db.stores.entry(name.to_string()).or_insert_with(|| ObjectStore {
                key_path: identity.key_path().to_string(),
                records: BTreeMap::new(),
            });
        }
        Ok(())
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn object_store<'a>(
    databases: &'a HashMap<String, Database>,
    identity: &StoreIdentity,
) -> StoreResult<&'a ObjectStore> {
    databases
        .get(identity.database())
        .and_then(|db| db.stores.get(identity.store()))
        .ok_or_else(|| missing_store(identity))
}

fn object_store_mut<'a>(
    databases: &'a mut HashMap<String, Database>,
    identity: &StoreIdentity,
) -> StoreResult<&'a mut ObjectStore> {
    databases
        .get_mut(identity.database())
        .and_then(|db| db.stores.get_mut(identity.store()))
        .ok_or_else(|| missing_store(identity))
}

fn missing_store(identity: &StoreIdentity) -> StoreError {
    StoreError::Backend(format!(
        "object store '{}' not found in database '{}'",
        identity.store(),
        identity.database()
    ))
}

#[async_trait(?Send)]
impl StorageEngine for MemoryEngine {
    async fn open(&self, identity: &StoreIdentity, declared_stores: &[&str]) -> StoreResult<()> {
        self.ensure_available()?;
        self.create_stores(identity, declared_stores)
    }

    async fn clear(&self, identity: &StoreIdentity) -> StoreResult<()> {
        self.ensure_available()?;
        let mut databases = self.databases.write();
        object_store_mut(&mut databases, identity)?.records.clear();
        Ok(())
    }

    async fn count(&self, identity: &StoreIdentity) -> StoreResult<usize> {
        self.ensure_available()?;
        let databases = self.databases.read();
        Ok(object_store(&databases, identity)?.records.len())
    }

    async fn delete_database(&self, name: &str) -> StoreResult<()> {
        self.ensure_available()?;
        self.databases.write().remove(name);
        Ok(())
    }

    async fn delete(&self, identity: &StoreIdentity, key: &Key) -> StoreResult<bool> {
        self.ensure_available()?;
        let mut databases = self.databases.write();
        object_store_mut(&mut databases, identity)?.records.remove(key);
        Ok(true)
    }

    async fn get(&self, identity: &StoreIdentity, key: &Key) -> StoreResult<Option<Value>> {
        self.ensure_available()?;
        let databases = self.databases.read();
        Ok(object_store(&databases, identity)?.records.get(key).cloned())
    }

    async fn get_all(&self, identity: &StoreIdentity) -> StoreResult<Vec<Value>> {
        self.ensure_available()?;
        let databases = self.databases.read();
        Ok(object_store(&databases, identity)?
            .records
            .values()
            .cloned()
            .collect())
    }

    async fn store_item(&self, identity: &StoreIdentity, serialized: &str) -> bool {
        if self.ensure_available().is_err() {
            return false;
        }
        let value: Value = match serde_json::from_str(serialized) {
            Ok(value) => value,
            Err(err) => {
                warn!(store = identity.store(), error = %err, "rejected malformed item");
                return false;
            }
        };

        let mut databases = self.databases.write();
        let store = match object_store_mut(&mut databases, identity) {
            Ok(store) => store,
            Err(err) => {
                warn!(error = %err, "store_item failed");
                return false;
            }
        };
        match Key::from_record(&value, &store.key_path) {
            Ok(key) => {
                store.records.insert(key, value);
                true
            }
            Err(err) => {
                warn!(store = identity.store(), error = %err, "item has no usable key");
                false
            }
        }
    }

    async fn open_cursor<'a>(
        &'a self,
        identity: &'a StoreIdentity,
        after: Option<&'a Key>,
    ) -> StoreResult<BoxedCursor<'a>> {
        self.ensure_available()?;
        object_store(&self.databases.read(), identity)?;

        let fault = self.fail_cursor_after.load(Ordering::SeqCst);
        Ok(Box::new(MemoryCursor {
            databases: Arc::clone(&self.databases),
            identity,
            position: after.map_or(Bound::Unbounded, |key| Bound::Excluded(key.clone())),
            reads: 0,
            fail_after: (fault != NO_FAULT).then_some(fault),
        }))
    }

    fn batch_ceiling(&self) -> usize {
        self.config.batch_ceiling
    }
}

/// Cursor that re-seeks past its last key on every read.
///
/// Holding no borrow of the map between reads means records appended behind
/// the cursor are still visited, as with a live IndexedDB cursor.
struct MemoryCursor<'a> {
    databases: Databases,
    identity: &'a StoreIdentity,
    position: Bound<Key>,
    reads: usize,
    fail_after: Option<usize>,
}

#[async_trait(?Send)]
impl<'a> RecordCursor for MemoryCursor<'a> {
    async fn next_record(&mut self) -> StoreResult<Option<Record>> {
        if self.fail_after == Some(self.reads) {
            return Err(StoreError::Backend("injected cursor failure".into()));
        }
        self.reads += 1;

        let databases = self.databases.read();
        let store = object_store(&databases, self.identity)?;
        let next = store
            .records
            .range((self.position.clone(), Bound::Unbounded))
            .next()
            .map(|(key, value)| Record {
                key: key.clone(),
                value: value.clone(),
            });

        if let Some(record) = &next {
            self.position = Bound::Excluded(record.key.clone());
        }
        Ok(next)
    }
}
