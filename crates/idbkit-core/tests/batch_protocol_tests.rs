//! Continuation protocol tests against MemoryEngine

use idbkit_core::{
    BatchRequest, BatchResult, ContinuationKey, Discriminator, EngineConfig, MemoryEngine,
    StorageEngine, StoreIdentity,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn notes() -> StoreIdentity {
    StoreIdentity::new("notes")
}

/// Engine holding records with ids `1..=count`; even ids are "task", odd "memo".
async fn seeded(count: i64, ceiling: usize) -> MemoryEngine {
    let engine = MemoryEngine::with_config(EngineConfig::default().batch_ceiling(ceiling));
    engine.open(&notes(), &[]).await.unwrap();
    for id in 1..=count {
        let kind = if id % 2 == 0 { "task" } else { "memo" };
        let item = json!({"id": id, "kind": kind, "value": format!("item {}", id)});
        assert!(engine.store_item(&notes(), &item.to_string()).await);
    }
    engine
}

fn ids(items: &[Value]) -> Vec<i64> {
    items.iter().map(|v| v["id"].as_i64().unwrap()).collect()
}

/// Follow continuation keys until exhaustion, returning every item and the
/// number of calls made. `skip` rides on the first call only; `take` is
/// reduced by what each call returned.
async fn drain(
    engine: &MemoryEngine,
    first: BatchRequest,
) -> (Vec<Value>, usize, Vec<BatchResult>) {
    let mut request = first;
    let mut items = Vec::new();
    let mut results = Vec::new();
    let mut calls = 0;
    loop {
        let result = engine.get_batch(&notes(), &request).await;
        calls += 1;
        items.extend(result.items.iter().cloned());
        results.push(result.clone());

        let Some(key) = result.continuation_key else {
            break;
        };
        let take = request.take.map(|t| t - result.items.len());
        if take == Some(0) {
            break;
        }
        request = BatchRequest {
            skip: None,
            take,
            continuation_key: Some(key),
            ..request
        };
        assert!(calls < 1000, "continuation chain did not terminate");
    }
    (items, calls, results)
}

#[tokio::test]
async fn test_twenty_five_items_in_two_batches() {
    let engine = seeded(25, 20).await;

    let first = engine.get_batch(&notes(), &BatchRequest::new().take(20)).await;
    assert_eq!(ids(&first.items), (1..=20).collect::<Vec<_>>());
    assert_eq!(first.continuation_key, Some(ContinuationKey::new("20")));

    let second = engine
        .get_batch(&notes(), &BatchRequest::new().after(ContinuationKey::new("20")))
        .await;
    assert_eq!(ids(&second.items), (21..=25).collect::<Vec<_>>());
    assert_eq!(second.continuation_key, None);

    let past_end = engine
        .get_batch(&notes(), &BatchRequest::new().after(ContinuationKey::new("25")))
        .await;
    assert_eq!(past_end, BatchResult::exhausted());
}

#[tokio::test]
async fn test_exhaustion_is_independent_of_ceiling() {
    for ceiling in [1, 2, 3, 7, 20, 25, 100] {
        let engine = seeded(25, ceiling).await;
        let (items, calls, _) = drain(&engine, BatchRequest::new()).await;
        assert_eq!(ids(&items), (1..=25).collect::<Vec<_>>(), "ceiling {}", ceiling);
        assert_eq!(calls, 25_usize.div_ceil(ceiling), "ceiling {}", ceiling);
    }
}

#[tokio::test]
async fn test_skip_applies_once() {
    for ceiling in [1, 4, 20] {
        let engine = seeded(25, ceiling).await;
        let (items, _, _) = drain(&engine, BatchRequest::new().skip(7)).await;
        assert_eq!(ids(&items), (8..=25).collect::<Vec<_>>(), "ceiling {}", ceiling);
    }
}

#[tokio::test]
async fn test_skip_past_end() {
    let engine = seeded(5, 20).await;
    let result = engine.get_batch(&notes(), &BatchRequest::new().skip(9)).await;
    assert_eq!(result, BatchResult::exhausted());
}

#[tokio::test]
async fn test_skip_ignored_on_resumed_call() {
    let engine = seeded(10, 20).await;
    let request = BatchRequest::new()
        .skip(3)
        .after(ContinuationKey::new("5"));
    let result = engine.get_batch(&notes(), &request).await;
    assert_eq!(ids(&result.items), vec![6, 7, 8, 9, 10]);
}

#[tokio::test]
async fn test_take_bound_across_chain() {
    let engine = seeded(25, 4).await;

    let (items, _, results) = drain(&engine, BatchRequest::new().take(10)).await;
    assert_eq!(ids(&items), (1..=10).collect::<Vec<_>>());
    // More records exist past the tenth, so the final call still carries a key.
    assert!(results.last().unwrap().continuation_key.is_some());

    let (items, _, results) = drain(&engine, BatchRequest::new().skip(20).take(5)).await;
    assert_eq!(ids(&items), (21..=25).collect::<Vec<_>>());
    assert!(results.last().unwrap().continuation_key.is_none());
}

#[tokio::test]
async fn test_zero_take_returns_nothing() {
    let engine = seeded(5, 20).await;
    let result = engine.get_batch(&notes(), &BatchRequest::new().take(0)).await;
    assert_eq!(result, BatchResult::exhausted());
}

#[tokio::test]
async fn test_discriminator_filters_before_windowing() {
    let engine = seeded(25, 3).await;
    let tasks = Discriminator::exact("kind", "task");

    let (items, _, _) = drain(&engine, BatchRequest::new().with_discriminator(&tasks)).await;
    let all = engine.get_all(&notes()).await.unwrap();
    let expected: Vec<Value> = all.into_iter().filter(|v| v["kind"] == "task").collect();
    assert_eq!(items, expected);
    assert!(items.iter().all(|v| v["kind"] == "task"));

    let request = BatchRequest::new()
        .with_discriminator(&tasks)
        .skip(2)
        .take(3);
    let (items, _, _) = drain(&engine, request).await;
    assert_eq!(ids(&items), vec![6, 8, 10]);
}

#[tokio::test]
async fn test_hierarchical_discriminator() {
    let engine = MemoryEngine::new();
    engine.open(&notes(), &[]).await.unwrap();
    for (id, kind) in [(1, "Animal.Dog"), (2, "Plant"), (3, "Animal.Cat"), (4, "Animal")] {
        let item = json!({"id": id, "kind": kind}).to_string();
        assert!(engine.store_item(&notes(), &item).await);
    }

    let request = BatchRequest::new().with_discriminator(&Discriminator::prefix("kind", "Animal"));
    let result = engine.get_batch(&notes(), &request).await;
    assert_eq!(ids(&result.items), vec![1, 3, 4]);
}

#[tokio::test]
async fn test_cursor_failure_truncates_quietly() {
    let engine = seeded(25, 20).await;
    engine.fail_cursor_after(6);

    let result = engine.get_batch(&notes(), &BatchRequest::new()).await;
    assert_eq!(ids(&result.items), (1..=6).collect::<Vec<_>>());
    assert_eq!(result.continuation_key, None);
}

#[tokio::test]
async fn test_unavailable_boundary_reads_as_exhausted() {
    let engine = seeded(5, 20).await;
    engine.set_available(false);

    let result = engine.get_batch(&notes(), &BatchRequest::new()).await;
    assert_eq!(result, BatchResult::exhausted());
}

#[tokio::test]
async fn test_resume_survives_appends() {
    let engine = seeded(10, 5).await;
    let first = engine.get_batch(&notes(), &BatchRequest::new()).await;
    assert_eq!(ids(&first.items), vec![1, 2, 3, 4, 5]);

    assert!(engine.store_item(&notes(), r#"{"id": 11, "kind": "memo"}"#).await);

    let key = first.continuation_key.unwrap();
    let (rest, _, _) = drain(&engine, BatchRequest::new().after(key)).await;
    assert_eq!(ids(&rest), (6..=11).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_text_keys_resume_in_order() {
    let engine = MemoryEngine::with_config(EngineConfig::default().batch_ceiling(2));
    engine.open(&notes(), &[]).await.unwrap();
    for id in ["delta", "alpha", "charlie", "bravo", "echo"] {
        let item = json!({"id": id}).to_string();
        assert!(engine.store_item(&notes(), &item).await);
    }

    let (items, calls, _) = drain(&engine, BatchRequest::new()).await;
    let keys: Vec<&str> = items.iter().map(|v| v["id"].as_str().unwrap()).collect();
    assert_eq!(keys, vec!["alpha", "bravo", "charlie", "delta", "echo"]);
    assert_eq!(calls, 3);
}

#[tokio::test]
async fn test_numeric_looking_text_keys_resume_as_text() {
    let engine = MemoryEngine::with_config(EngineConfig::default().batch_ceiling(2));
    engine.open(&notes(), &[]).await.unwrap();
    for id in ["3", "1", "20", "5", "2"] {
        let item = json!({"id": id}).to_string();
        assert!(engine.store_item(&notes(), &item).await);
    }

    let (items, calls, results) = drain(&engine, BatchRequest::new()).await;
    let keys: Vec<&str> = items.iter().map(|v| v["id"].as_str().unwrap()).collect();
    assert_eq!(keys, vec!["1", "2", "20", "3", "5"]);
    assert_eq!(calls, 3);
    assert_eq!(
        results[0].continuation_key,
        Some(ContinuationKey::new(r#""2""#))
    );

    // Numbers sort before text, so a numeric 2 in the same store stays ahead.
    assert!(engine.store_item(&notes(), r#"{"id": 2}"#).await);
    let (items, _, _) = drain(&engine, BatchRequest::new()).await;
    assert_eq!(items.len(), 6);
    assert_eq!(items[0]["id"], json!(2));
    assert_eq!(items[1]["id"], json!("1"));
}
