//! Storage engine contract

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::batch::{walk_batch, BatchRequest, BatchResult, DEFAULT_BATCH_CEILING};
use crate::identity::StoreIdentity;
use crate::key::{ContinuationKey, Key};
use crate::logging::prefix;
use crate::storage::error::StoreResult;

/// A raw record and its primary key, as a cursor yields it.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub key: Key,
    pub value: Value,
}

/// Forward cursor over one store, in ascending key order.
#[async_trait(?Send)]
pub trait RecordCursor {
    /// Advance and return the next record, or `None` at the end.
    async fn next_record(&mut self) -> StoreResult<Option<Record>>;
}

pub type BoxedCursor<'a> = Box<dyn RecordCursor + 'a>;

/// Boundary adapter over a key-value object store.
///
/// Every method may suspend on the storage boundary. Primitive operations
/// propagate boundary failures; `get_batch` never fails and turns them into an
/// exhausted chain instead. Implementations keep no per-iterator state: a
/// cursor is reopened and re-seeked from the continuation key on every call.
#[async_trait(?Send)]
pub trait StorageEngine {
    /// Open the database, creating any of `declared_stores` that are missing
    /// with the identity's key path. Idempotent.
    async fn open(&self, identity: &StoreIdentity, declared_stores: &[&str]) -> StoreResult<()>;

    /// Remove every record from the store.
    async fn clear(&self, identity: &StoreIdentity) -> StoreResult<()>;

    /// Number of records in the store.
    async fn count(&self, identity: &StoreIdentity) -> StoreResult<usize>;

    /// Delete a whole database and all its stores.
    async fn delete_database(&self, name: &str) -> StoreResult<()>;

    /// Delete the record under `key`.
    ///
    /// A missing key is not an error: returns `true` whenever the delete
    /// completed.
    async fn delete(&self, identity: &StoreIdentity, key: &Key) -> StoreResult<bool>;

    /// Fetch the record under `key`, or `None` if absent.
    async fn get(&self, identity: &StoreIdentity, key: &Key) -> StoreResult<Option<Value>>;

    /// Every record in key order.
    async fn get_all(&self, identity: &StoreIdentity) -> StoreResult<Vec<Value>>;

    /// Upsert a serialized record under the key found at the key path.
    ///
    /// Returns `false` when the item cannot be parsed or written.
    async fn store_item(&self, identity: &StoreIdentity, serialized: &str) -> bool;

    /// Open a fresh forward cursor, positioned just after `after` when given.
    async fn open_cursor<'a>(
        &'a self,
        identity: &'a StoreIdentity,
        after: Option<&'a Key>,
    ) -> StoreResult<BoxedCursor<'a>>;

    /// Upper bound on records per batch.
    fn batch_ceiling(&self) -> usize {
        DEFAULT_BATCH_CEILING
    }

    /// Serve one batch of the continuation protocol.
    async fn get_batch(&self, identity: &StoreIdentity, request: &BatchRequest) -> BatchResult {
        if request.take == Some(0) {
            return BatchResult::exhausted();
        }

        let after = request.continuation_key.as_ref().map(ContinuationKey::to_key);
        let mut cursor = match self.open_cursor(identity, after.as_ref()).await {
            Ok(cursor) => cursor,
            Err(err) => {
                warn!(
                    store = identity.store(),
                    error = %err,
                    "{} failed to open cursor, treating store as exhausted",
                    prefix::DB
                );
                return BatchResult::exhausted();
            }
        };

        let discriminator = request.discriminator();
        let result = walk_batch(
            cursor.as_mut(),
            request,
            discriminator.as_ref(),
            self.batch_ceiling(),
        )
        .await;

        debug!(
            store = identity.store(),
            items = result.items.len(),
            continuation = ?result.continuation_key,
            "{} served batch",
            prefix::BATCH
        );
        result
    }
}
