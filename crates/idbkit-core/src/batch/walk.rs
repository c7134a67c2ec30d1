//! The forward cursor walk shared by every engine.

use tracing::{debug, warn};

use crate::batch::{BatchRequest, BatchResult};
use crate::discriminator::Discriminator;
use crate::key::{ContinuationKey, Key};
use crate::logging::prefix;
use crate::storage::RecordCursor;

/// Walk `cursor` forward and cut one batch out of it.
///
/// Records failing `discriminator` are invisible: they count toward neither
/// skip nor take. Skip applies only when the request carries no continuation
/// key. The walk stops once `min(take, ceiling)` records are gathered, and
/// peeks for one more matching record: the continuation key is present only
/// when that record exists, and names the last record *included*, so the next
/// call re-reads the peeked one.
///
/// A cursor error ends the walk as if the store were exhausted. What was
/// gathered so far is still returned.
pub async fn walk_batch(
    cursor: &mut dyn RecordCursor,
    request: &BatchRequest,
    discriminator: Option<&Discriminator>,
    ceiling: usize,
) -> BatchResult {
    let take = request.take.unwrap_or(usize::MAX);
    if take == 0 {
        return BatchResult::exhausted();
    }
    let limit = take.min(ceiling.max(1));

    if request.skip.is_some() && request.continuation_key.is_some() {
        debug!("ignoring skip on a resumed cursor chain");
    }
    let mut to_skip = request.effective_skip();

    let mut items = Vec::new();
    let mut last_key: Option<Key> = None;

    loop {
        let record = match cursor.next_record().await {
            Ok(Some(record)) => record,
            Ok(None) => break,
            Err(err) => {
                warn!(
                    error = %err,
                    gathered = items.len(),
                    "{} cursor failed mid-walk, treating store as exhausted",
                    prefix::BATCH
                );
                break;
            }
        };

        if let Some(d) = discriminator {
            if !d.matches(&record.value) {
                continue;
            }
        }

        if to_skip > 0 {
            to_skip -= 1;
            continue;
        }

        if items.len() == limit {
            return BatchResult {
                items,
                continuation_key: last_key.as_ref().map(ContinuationKey::after),
            };
        }

        last_key = Some(record.key);
        items.push(record.value);
    }

    BatchResult {
        items,
        continuation_key: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Record, StoreError, StoreResult};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;

    /// Cursor over a fixed list, optionally failing after `fail_after` reads.
    struct ListCursor {
        records: VecDeque<Record>,
        reads: usize,
        fail_after: Option<usize>,
    }

    impl ListCursor {
        fn new(keys: impl IntoIterator<Item = i64>) -> Self {
            let records = keys
                .into_iter()
                .map(|k| Record {
                    key: Key::Number(k),
                    value: json!({"id": k, "kind": if k % 2 == 0 { "even" } else { "odd" }}),
                })
                .collect();
            Self {
                records,
                reads: 0,
                fail_after: None,
            }
        }
    }

    #[async_trait(?Send)]
    impl RecordCursor for ListCursor {
        async fn next_record(&mut self) -> StoreResult<Option<Record>> {
            if self.fail_after == Some(self.reads) {
                return Err(StoreError::Backend("transaction aborted".into()));
            }
            self.reads += 1;
            Ok(self.records.pop_front())
        }
    }

    fn ids(result: &BatchResult) -> Vec<i64> {
        result
            .items
            .iter()
            .map(|v| v["id"].as_i64().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_ceiling_bounds_batch_and_sets_key() {
        let mut cursor = ListCursor::new(1..=25);
        let result = walk_batch(&mut cursor, &BatchRequest::new(), None, 20).await;
        assert_eq!(ids(&result), (1..=20).collect::<Vec<_>>());
        assert_eq!(result.continuation_key, Some(ContinuationKey::new("20")));
    }

    #[tokio::test]
    async fn test_exact_fit_has_no_key() {
        let mut cursor = ListCursor::new(1..=20);
        let result = walk_batch(&mut cursor, &BatchRequest::new().take(20), None, 20).await;
        assert_eq!(result.items.len(), 20);
        assert!(result.is_last());
    }

    #[tokio::test]
    async fn test_discriminator_applies_before_skip() {
        let mut cursor = ListCursor::new(1..=10);
        let d = Discriminator::exact("kind", "even");
        let result = walk_batch(&mut cursor, &BatchRequest::new().skip(2), Some(&d), 20).await;
        assert_eq!(ids(&result), vec![6, 8, 10]);
        assert!(result.is_last());
    }

    #[tokio::test]
    async fn test_zero_take_never_reads() {
        let mut cursor = ListCursor::new(1..=3);
        let result = walk_batch(&mut cursor, &BatchRequest::new().take(0), None, 20).await;
        assert_eq!(result, BatchResult::exhausted());
        assert_eq!(cursor.reads, 0);
    }

    #[tokio::test]
    async fn test_cursor_error_truncates() {
        let mut cursor = ListCursor::new(1..=10);
        cursor.fail_after = Some(4);
        let result = walk_batch(&mut cursor, &BatchRequest::new(), None, 20).await;
        assert_eq!(ids(&result), vec![1, 2, 3, 4]);
        assert!(result.is_last());
    }
}
