//! Pull-based driver for one continuation chain.

use std::rc::Rc;

use serde_json::Value;
use tracing::debug;

use crate::batch::BatchRequest;
use crate::cancel::CancellationToken;
use crate::discriminator::Discriminator;
use crate::identity::StoreIdentity;
use crate::key::ContinuationKey;
use crate::logging::prefix;
use crate::storage::StorageEngine;

/// Where a pager's chain currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PagerState {
    /// No batch requested yet.
    Unopened,
    /// Resume after this key on the next pull.
    Positioned(ContinuationKey),
    /// A batch came back without a continuation key, take was met, or the
    /// chain was cancelled.
    Exhausted,
}

/// Drives `get-batch` calls for one iteration.
///
/// Each pager owns its continuation chain; engines keep nothing between
/// calls. The initial skip rides on the first request only, and the take is
/// reduced by every batch returned so the whole chain never exceeds it.
pub struct BatchPager {
    engine: Rc<dyn StorageEngine>,
    identity: StoreIdentity,
    discriminator: Option<Discriminator>,
    skip: usize,
    remaining: Option<usize>,
    cancel: CancellationToken,
    state: PagerState,
    batches: usize,
}

impl BatchPager {
    pub fn new(engine: Rc<dyn StorageEngine>, identity: StoreIdentity) -> Self {
        Self {
            engine,
            identity,
            discriminator: None,
            skip: 0,
            remaining: None,
            cancel: CancellationToken::new(),
            state: PagerState::Unopened,
            batches: 0,
        }
    }

    pub fn discriminator(mut self, discriminator: Option<Discriminator>) -> Self {
        self.discriminator = discriminator;
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn take(mut self, take: Option<usize>) -> Self {
        self.remaining = take;
        self
    }

    pub fn cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn state(&self) -> &PagerState {
        &self.state
    }

    /// Number of `get-batch` round trips made so far.
    pub fn batches(&self) -> usize {
        self.batches
    }

    fn next_request(&self) -> Option<BatchRequest> {
        let mut request = BatchRequest {
            take: self.remaining,
            ..Default::default()
        };
        if let Some(d) = &self.discriminator {
            request = request.with_discriminator(d);
        }
        match &self.state {
            PagerState::Exhausted => None,
            PagerState::Unopened => {
                if self.skip > 0 {
                    request.skip = Some(self.skip);
                }
                Some(request)
            }
            PagerState::Positioned(key) => Some(request.after(key.clone())),
        }
    }

    /// Pull the next non-empty batch, or `None` once the chain is done.
    pub async fn next_batch(&mut self) -> Option<Vec<Value>> {
        loop {
            if self.cancel.is_cancelled() {
                debug!(
                    store = self.identity.store(),
                    "{} batch chain cancelled",
                    prefix::QUERY
                );
                self.state = PagerState::Exhausted;
                return None;
            }
            if self.remaining == Some(0) {
                self.state = PagerState::Exhausted;
                return None;
            }

            let request = self.next_request()?;
            let result = self.engine.get_batch(&self.identity, &request).await;
            self.batches += 1;

            if let Some(remaining) = self.remaining.as_mut() {
                *remaining = remaining.saturating_sub(result.items.len());
            }
            self.state = match result.continuation_key {
                Some(key) => PagerState::Positioned(key),
                None => PagerState::Exhausted,
            };

            if !result.items.is_empty() {
                return Some(result.items);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryEngine;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    /// Pager over ids `1..=count` at the default ceiling of 20.
    fn pager(count: i64) -> BatchPager {
        let identity = StoreIdentity::new("notes");
        let engine =
            MemoryEngine::with_records(&identity, (1..=count).map(|id| json!({"id": id})))
                .unwrap();
        BatchPager::new(Rc::new(engine), identity)
    }

    async fn drain(pager: &mut BatchPager) -> Vec<i64> {
        let mut ids = Vec::new();
        while let Some(batch) = pager.next_batch().await {
            ids.extend(batch.iter().map(|v| v["id"].as_i64().unwrap()));
        }
        ids
    }

    #[tokio::test]
    async fn test_skip_once_and_take_across_batches() {
        let mut pager = pager(30).skip(3).take(Some(21));
        let ids = drain(&mut pager).await;
        assert_eq!(ids, (4..=24).collect::<Vec<_>>());
        assert_eq!(pager.batches(), 2);
        assert_eq!(pager.state(), &PagerState::Exhausted);
    }

    #[tokio::test]
    async fn test_cancelled_pager_makes_no_calls() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut pager = pager(5).cancellation(cancel);
        assert_eq!(pager.next_batch().await, None);
        assert_eq!(pager.batches(), 0);
    }
}
