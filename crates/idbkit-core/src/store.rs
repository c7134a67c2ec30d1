//! Typed façade over one object store.

use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::batch::{BatchRequest, BatchResult};
use crate::cancel::CancellationToken;
use crate::discriminator::{DiscriminatorScheme, TypeDiscriminator};
use crate::identity::StoreIdentity;
use crate::key::Key;
use crate::query::Query;
use crate::storage::{StorageEngine, StoreResult};

/// A store identity bound to the engine that serves it.
///
/// Primitive operations propagate boundary failures. Reads that decode
/// records skip (or return `None` for) records that do not decode as the
/// requested type, so one malformed record never aborts a scan.
#[derive(Clone)]
pub struct Store {
    engine: Rc<dyn StorageEngine>,
    identity: StoreIdentity,
    scheme: DiscriminatorScheme,
}

impl Store {
    pub fn new(engine: Rc<dyn StorageEngine>, identity: StoreIdentity) -> Self {
        Self {
            engine,
            identity,
            scheme: DiscriminatorScheme::None,
        }
    }

    /// Declare how this store marks the type of each record.
    pub fn with_scheme(mut self, scheme: DiscriminatorScheme) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn identity(&self) -> &StoreIdentity {
        &self.identity
    }

    pub fn engine(&self) -> &Rc<dyn StorageEngine> {
        &self.engine
    }

    pub fn scheme(&self) -> &DiscriminatorScheme {
        &self.scheme
    }

    /// Open (or create) this store.
    pub async fn open(&self) -> StoreResult<()> {
        self.engine.open(&self.identity, &[]).await
    }

    /// Open this store and create any sibling stores in `declared_stores`.
    pub async fn open_with(&self, declared_stores: &[&str]) -> StoreResult<()> {
        self.engine.open(&self.identity, declared_stores).await
    }

    pub async fn clear(&self) -> StoreResult<()> {
        self.engine.clear(&self.identity).await
    }

    pub async fn count(&self) -> StoreResult<usize> {
        self.engine.count(&self.identity).await
    }

    /// Delete the record under `key`; a missing key still returns `true`.
    pub async fn delete(&self, key: impl Into<Key>) -> StoreResult<bool> {
        self.engine.delete(&self.identity, &key.into()).await
    }

    /// Delete this store's whole database.
    pub async fn delete_database(&self) -> StoreResult<()> {
        self.engine
            .delete_database(self.identity.database())
            .await
    }

    /// Fetch and decode the record under `key`.
    ///
    /// `None` when absent or when the record does not decode as `T`.
    pub async fn get<T: DeserializeOwned>(&self, key: impl Into<Key>) -> StoreResult<Option<T>> {
        let key = key.into();
        let Some(value) = self.engine.get(&self.identity, &key).await? else {
            return Ok(None);
        };
        match serde_json::from_value(value) {
            Ok(item) => Ok(Some(item)),
            Err(err) => {
                debug!(key = %key, error = %err, "record does not decode as requested type");
                Ok(None)
            }
        }
    }

    /// Every record of type `T`, in key order.
    ///
    /// Records of other discriminated types and records that fail to decode
    /// are left out.
    pub async fn get_all<T>(&self) -> StoreResult<Vec<T>>
    where
        T: DeserializeOwned + TypeDiscriminator,
    {
        let discriminator = self.scheme.resolve::<T>();
        let values = self.engine.get_all(&self.identity).await?;
        let total = values.len();

        let items: Vec<T> = values
            .into_iter()
            .filter(|value| discriminator.as_ref().map_or(true, |d| d.matches(value)))
            .filter_map(|value| serde_json::from_value(value).ok())
            .collect();

        debug!(store = self.identity.store(), total, kept = items.len(), "get_all");
        Ok(items)
    }

    /// Upsert `item`. `false` when it cannot be serialized or written.
    pub async fn put<T: Serialize>(&self, item: &T) -> bool {
        match serde_json::to_string(item) {
            Ok(serialized) => self.put_raw(&serialized).await,
            Err(err) => {
                warn!(store = self.identity.store(), error = %err, "failed to serialize item");
                false
            }
        }
    }

    /// Upsert an already serialized record.
    pub async fn put_raw(&self, serialized: &str) -> bool {
        self.engine.store_item(&self.identity, serialized).await
    }

    /// One raw batch of the continuation protocol.
    pub async fn get_batch(&self, request: &BatchRequest) -> BatchResult {
        self.engine.get_batch(&self.identity, request).await
    }

    /// Lazy query over every record of type `T`.
    pub fn query<T>(&self) -> Query<T>
    where
        T: DeserializeOwned + TypeDiscriminator + 'static,
    {
        self.query_with_cancellation(CancellationToken::new())
    }

    /// Lazy query that stops quietly between batches once `cancel` fires.
    pub fn query_with_cancellation<T>(&self, cancel: CancellationToken) -> Query<T>
    where
        T: DeserializeOwned + TypeDiscriminator + 'static,
    {
        Query::from_store(
            Rc::clone(&self.engine),
            self.identity.clone(),
            self.scheme.resolve::<T>(),
            cancel,
        )
    }
}
