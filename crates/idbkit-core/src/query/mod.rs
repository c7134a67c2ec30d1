//! Lazy, restartable, composable queries over the batch protocol.
//!
//! A [`Query`] is an immutable node: `filter`, `map`, `flat_map`, `skip`,
//! `take` and `order_by` each return a new node and leave the receiver
//! usable. Nothing touches storage until the query is iterated, and every
//! iteration starts a brand-new continuation chain.
//!
//! A store-backed query pushes only its type discriminator into the batch
//! requests. Skip and take count decoded items, so they are applied after
//! records that fail to decode have been dropped.
//!
//! ```rust
//! # futures::executor::block_on(async {
//! use std::rc::Rc;
//! use idbkit_core::{MemoryEngine, Store, StoreIdentity};
//! use serde_json::{json, Value};
//!
//! let identity = StoreIdentity::new("notes");
//! let engine = MemoryEngine::with_records(
//!     &identity,
//!     (1..=25).map(|id| json!({"id": id})),
//! ).unwrap();
//! let store = Store::new(Rc::new(engine), identity);
//!
//! let page = store.query::<Value>().page(2, 10).await;
//! assert_eq!(page.items.first().unwrap()["id"], 11);
//! assert_eq!(page.total_count, 25);
//! # });
//! ```

mod ordered;
mod page;

pub use ordered::OrderedQuery;
pub use page::Page;

use std::cmp::Ordering;
use std::future;
use std::rc::Rc;

use futures::stream::{self, LocalBoxStream, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::batch::BatchPager;
use crate::cancel::CancellationToken;
use crate::discriminator::Discriminator;
use crate::identity::StoreIdentity;
use crate::storage::{Cardinality, StorageEngine, StoreError, StoreResult};

/// Lazily produced items of a query.
pub type ItemStream<T> = LocalBoxStream<'static, T>;

type Predicate<T> = Rc<dyn Fn(&T) -> bool>;
type StreamFactory<T> = Rc<dyn Fn() -> ItemStream<T>>;

/// Where a store-backed query reads from.
struct StoreSource {
    engine: Rc<dyn StorageEngine>,
    identity: StoreIdentity,
    discriminator: Option<Discriminator>,
}

enum Source<T> {
    /// Raw records decoded as `T`.
    Store {
        root: Rc<StoreSource>,
        decode: fn(Value) -> Option<T>,
    },
    /// Any other upstream: a projection, a sort, a windowed inner query.
    Derived(StreamFactory<T>),
}

impl<T> Clone for Source<T> {
    fn clone(&self) -> Self {
        match self {
            Source::Store { root, decode } => Source::Store {
                root: Rc::clone(root),
                decode: *decode,
            },
            Source::Derived(factory) => Source::Derived(Rc::clone(factory)),
        }
    }
}

/// A lazy sequence of `T` backed by repeated batch fetches.
pub struct Query<T> {
    source: Source<T>,
    predicate: Option<Predicate<T>>,
    skip: usize,
    take: Option<usize>,
    cancel: CancellationToken,
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            predicate: self.predicate.clone(),
            skip: self.skip,
            take: self.take,
            cancel: self.cancel.clone(),
        }
    }
}

fn decode_record<T: DeserializeOwned>(value: Value) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(item) => Some(item),
        Err(err) => {
            debug!(error = %err, "skipping record that does not decode as the requested type");
            None
        }
    }
}

impl<T: DeserializeOwned + 'static> Query<T> {
    pub(crate) fn from_store(
        engine: Rc<dyn StorageEngine>,
        identity: StoreIdentity,
        discriminator: Option<Discriminator>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source: Source::Store {
                root: Rc::new(StoreSource {
                    engine,
                    identity,
                    discriminator,
                }),
                decode: decode_record::<T>,
            },
            predicate: None,
            skip: 0,
            take: None,
            cancel,
        }
    }
}

impl<T: 'static> Query<T> {
    fn derived(factory: StreamFactory<T>, cancel: CancellationToken) -> Self {
        Self {
            source: Source::Derived(factory),
            predicate: None,
            skip: 0,
            take: None,
            cancel,
        }
    }

    /// This node as the upstream of a new one.
    fn as_factory(&self) -> StreamFactory<T> {
        let query = self.clone();
        Rc::new(move || query.iterate())
    }

    fn is_windowed(&self) -> bool {
        self.skip > 0 || self.take.is_some()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Start a fresh iteration.
    ///
    /// Each call opens a new continuation chain from the start of the store,
    /// independent of any other iteration of the same query.
    pub fn iterate(&self) -> ItemStream<T> {
        let mut items = match &self.source {
            Source::Store { root, decode } => store_stream(root, *decode, &self.cancel),
            Source::Derived(factory) => factory(),
        };
        if let Some(predicate) = self.predicate.clone() {
            items = items
                .filter(move |item| future::ready(predicate(item)))
                .boxed_local();
        }
        if self.skip > 0 {
            items = items.skip(self.skip).boxed_local();
        }
        if let Some(take) = self.take {
            items = items.take(take).boxed_local();
        }
        items
    }

    /// Keep items matching `predicate`.
    ///
    /// Consecutive filters on an unwindowed node merge into one AND-ed test.
    pub fn filter(&self, predicate: impl Fn(&T) -> bool + 'static) -> Query<T> {
        if self.is_windowed() {
            return Query::derived(self.as_factory(), self.cancel.clone()).filter(predicate);
        }
        let merged: Predicate<T> = match self.predicate.clone() {
            Some(previous) => Rc::new(move |item: &T| previous(item) && predicate(item)),
            None => Rc::new(predicate),
        };
        Query {
            predicate: Some(merged),
            ..self.clone()
        }
    }

    /// Project every item.
    pub fn map<U: 'static>(&self, projection: impl Fn(T) -> U + 'static) -> Query<U> {
        let upstream = self.as_factory();
        let projection = Rc::new(projection);
        let factory: StreamFactory<U> = Rc::new(move || {
            let projection = Rc::clone(&projection);
            upstream().map(move |item| projection(item)).boxed_local()
        });
        Query::derived(factory, self.cancel.clone())
    }

    /// Project every item to a collection and flatten the results.
    pub fn flat_map<U, I>(&self, projection: impl Fn(T) -> I + 'static) -> Query<U>
    where
        U: 'static,
        I: IntoIterator<Item = U> + 'static,
        I::IntoIter: 'static,
    {
        let upstream = self.as_factory();
        let projection = Rc::new(projection);
        let factory: StreamFactory<U> = Rc::new(move || {
            let projection = Rc::clone(&projection);
            upstream()
                .flat_map(move |item| stream::iter(projection(item)))
                .boxed_local()
        });
        Query::derived(factory, self.cancel.clone())
    }

    /// Drop the first `count` items.
    pub fn skip(&self, count: usize) -> Query<T> {
        Query {
            skip: self.skip + count,
            take: self.take.map(|take| take.saturating_sub(count)),
            ..self.clone()
        }
    }

    /// Yield at most `count` items.
    pub fn take(&self, count: usize) -> Query<T> {
        Query {
            take: Some(self.take.map_or(count, |take| take.min(count))),
            ..self.clone()
        }
    }

    /// Sort ascending by `key`. Drains this query before yielding anything.
    pub fn order_by<K: Ord + 'static>(&self, key: impl Fn(&T) -> K + 'static) -> OrderedQuery<T> {
        OrderedQuery::new(self.clone(), ordered::ascending(key))
    }

    /// Sort descending by `key`. Drains this query before yielding anything.
    pub fn order_by_descending<K: Ord + 'static>(&self, key: impl Fn(&T) -> K + 'static) -> OrderedQuery<T> {
        OrderedQuery::new(self.clone(), ordered::descending(key))
    }

    // ------------------------------------------------------------------------
    // Terminal operators
    // ------------------------------------------------------------------------

    /// Materialize every item.
    pub async fn to_list(&self) -> Vec<T> {
        self.iterate().collect().await
    }

    pub async fn count(&self) -> usize {
        let mut items = self.iterate();
        let mut count = 0;
        while items.next().await.is_some() {
            count += 1;
        }
        count
    }

    pub async fn any(&self) -> bool {
        self.first_or_default().await.is_some()
    }

    pub async fn any_where(&self, predicate: impl Fn(&T) -> bool + 'static) -> bool {
        self.filter(predicate).any().await
    }

    pub async fn first_or_default(&self) -> Option<T> {
        self.take(1).iterate().next().await
    }

    pub async fn first_or_default_where(
        &self,
        predicate: impl Fn(&T) -> bool + 'static,
    ) -> Option<T> {
        self.filter(predicate).first_or_default().await
    }

    /// First item, or `EmptyOrAmbiguous` when there is none.
    pub async fn first(&self) -> StoreResult<T> {
        self.first_or_default()
            .await
            .ok_or(StoreError::EmptyOrAmbiguous(Cardinality::Empty))
    }

    pub async fn first_where(&self, predicate: impl Fn(&T) -> bool + 'static) -> StoreResult<T> {
        self.filter(predicate).first().await
    }

    /// The only item, `None` when empty, `EmptyOrAmbiguous` when several.
    pub async fn single_or_default(&self) -> StoreResult<Option<T>> {
        let mut items = self.take(2).to_list().await;
        match items.len() {
            0 => Ok(None),
            1 => Ok(items.pop()),
            _ => Err(StoreError::EmptyOrAmbiguous(Cardinality::MoreThanOne)),
        }
    }

    /// The only item; `EmptyOrAmbiguous` unless there is exactly one.
    pub async fn single(&self) -> StoreResult<T> {
        self.single_or_default()
            .await?
            .ok_or(StoreError::EmptyOrAmbiguous(Cardinality::Empty))
    }

    /// Largest item. Among equal items the earliest in cursor order wins.
    pub async fn max(&self) -> Option<T>
    where
        T: Ord,
    {
        self.best_by(|candidate, best| candidate.cmp(best)).await
    }

    /// Smallest item. Among equal items the earliest in cursor order wins.
    pub async fn min(&self) -> Option<T>
    where
        T: Ord,
    {
        self.best_by(|candidate, best| best.cmp(candidate)).await
    }

    pub async fn max_by_key<K: Ord>(&self, key: impl Fn(&T) -> K) -> Option<T> {
        self.best_by(|candidate, best| key(candidate).cmp(&key(best)))
            .await
    }

    pub async fn min_by_key<K: Ord>(&self, key: impl Fn(&T) -> K) -> Option<T> {
        self.best_by(|candidate, best| key(best).cmp(&key(candidate)))
            .await
    }

    /// Keep the first item that no later item beats (`Greater` replaces).
    async fn best_by(&self, compare: impl Fn(&T, &T) -> Ordering) -> Option<T> {
        let mut items = self.iterate();
        let mut best = items.next().await?;
        while let Some(candidate) = items.next().await {
            if compare(&candidate, &best) == Ordering::Greater {
                best = candidate;
            }
        }
        Some(best)
    }

    /// Combine every item into an accumulator.
    pub async fn fold<A>(&self, init: A, mut combine: impl FnMut(A, T) -> A) -> A {
        let mut items = self.iterate();
        let mut acc = init;
        while let Some(item) = items.next().await {
            acc = combine(acc, item);
        }
        acc
    }

    /// One 1-based page plus the total item count.
    ///
    /// The total comes from iterating to the end of the sequence, not from a
    /// separate count request, so the cost grows with the whole result set.
    pub async fn page(&self, page_number: usize, page_size: usize) -> Page<T> {
        let page_number = page_number.max(1);
        let start = (page_number - 1).saturating_mul(page_size);
        let end = start.saturating_add(page_size);

        let mut items = self.iterate();
        let mut window = Vec::with_capacity(page_size.min(1024));
        let mut total = 0;
        while let Some(item) = items.next().await {
            if total >= start && total < end {
                window.push(item);
            }
            total += 1;
        }

        Page {
            items: window,
            page_number,
            page_size,
            total_count: total,
        }
    }
}

/// Decoded records of one fresh continuation chain.
///
/// The stream is pulled one batch at a time, so a `take` downstream stops
/// further `get-batch` calls as soon as it is satisfied.
fn store_stream<T: 'static>(
    root: &Rc<StoreSource>,
    decode: fn(Value) -> Option<T>,
    cancel: &CancellationToken,
) -> ItemStream<T> {
    let pager = BatchPager::new(Rc::clone(&root.engine), root.identity.clone())
        .discriminator(root.discriminator.clone())
        .cancellation(cancel.clone());

    stream::unfold(pager, |mut pager| async move {
        let batch = pager.next_batch().await?;
        Some((stream::iter(batch), pager))
    })
    .flatten()
    .filter_map(move |value| future::ready(decode(value)))
    .boxed_local()
}
