//! Materializing sort operator.

use std::cmp::Ordering;
use std::ops::Deref;
use std::rc::Rc;

use futures::stream::{self, StreamExt};

use crate::query::{Query, StreamFactory};

pub(crate) type Comparator<T> = Rc<dyn Fn(&T, &T) -> Ordering>;

pub(crate) fn ascending<T, K: Ord + 'static>(key: impl Fn(&T) -> K + 'static) -> Comparator<T> {
    Rc::new(move |a: &T, b: &T| key(a).cmp(&key(b)))
}

pub(crate) fn descending<T, K: Ord + 'static>(key: impl Fn(&T) -> K + 'static) -> Comparator<T> {
    Rc::new(move |a: &T, b: &T| key(b).cmp(&key(a)))
}

/// A query sorted by one or more keys.
///
/// Cursor order is primary-key order, so sorting cannot stream: iterating
/// drains the inner query (with its own skip/take applied) into memory and
/// sorts it stably. Derefs to the sorted [`Query`], so every operator and
/// terminal is available; `then_by` adds tie-breaking keys.
pub struct OrderedQuery<T> {
    inner: Query<T>,
    comparators: Vec<Comparator<T>>,
    sorted: Query<T>,
}

impl<T: 'static> OrderedQuery<T> {
    pub(crate) fn new(inner: Query<T>, primary: Comparator<T>) -> Self {
        Self::with_comparators(inner, vec![primary])
    }

    fn with_comparators(inner: Query<T>, comparators: Vec<Comparator<T>>) -> Self {
        let sorted = Query::derived(
            sort_factory(inner.clone(), comparators.clone()),
            inner.cancellation().clone(),
        );
        Self {
            inner,
            comparators,
            sorted,
        }
    }

    /// Break ties ascending by `key`.
    pub fn then_by<K: Ord + 'static>(&self, key: impl Fn(&T) -> K + 'static) -> OrderedQuery<T> {
        self.push(ascending(key))
    }

    /// Break ties descending by `key`.
    pub fn then_by_descending<K: Ord + 'static>(
        &self,
        key: impl Fn(&T) -> K + 'static,
    ) -> OrderedQuery<T> {
        self.push(descending(key))
    }

    fn push(&self, comparator: Comparator<T>) -> OrderedQuery<T> {
        let mut comparators = self.comparators.clone();
        comparators.push(comparator);
        OrderedQuery::with_comparators(self.inner.clone(), comparators)
    }

    /// The sorted sequence as a plain query node.
    pub fn into_query(self) -> Query<T> {
        self.sorted
    }
}

impl<T> Deref for OrderedQuery<T> {
    type Target = Query<T>;

    fn deref(&self) -> &Query<T> {
        &self.sorted
    }
}

fn sort_factory<T: 'static>(inner: Query<T>, comparators: Vec<Comparator<T>>) -> StreamFactory<T> {
    let comparators: Rc<[Comparator<T>]> = comparators.into();
    Rc::new(move || {
        let inner = inner.clone();
        let comparators = Rc::clone(&comparators);
        stream::once(async move {
            let mut items = inner.to_list().await;
            if inner.cancellation().is_cancelled() {
                items.clear();
            }
            items.sort_by(|a, b| {
                comparators
                    .iter()
                    .map(|compare| compare(a, b))
                    .find(|ordering| *ordering != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
            stream::iter(items)
        })
        .flatten()
        .boxed_local()
    })
}
