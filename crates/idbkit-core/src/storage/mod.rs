//! Storage abstraction
//!
//! [`StorageEngine`] is the boundary every backend implements. Backends exist
//! for:
//!
//! - **Memory**: in-process `BTreeMap` storage for tests and native use (`MemoryEngine`)
//! - **IndexedDB**: browser storage via web-sys (separate crate, WASM only)
//!
//! Engines only supply primitive operations and a forward cursor; the batch
//! walk on top of the cursor is shared.
//!
//! # Example
//!
//! ```rust
//! # futures::executor::block_on(async {
//! use idbkit_core::storage::{MemoryEngine, StorageEngine};
//! use idbkit_core::{BatchRequest, StoreIdentity};
//!
//! let engine = MemoryEngine::new();
//! let notes = StoreIdentity::new("notes");
//! engine.open(&notes, &["notes"]).await.unwrap();
//!
//! for id in 1..=3 {
//!     assert!(engine.store_item(&notes, &format!(r#"{{"id":{}}}"#, id)).await);
//! }
//!
//! let batch = engine.get_batch(&notes, &BatchRequest::new().take(2)).await;
//! assert_eq!(batch.items.len(), 2);
//! assert_eq!(batch.continuation_key.unwrap().as_str(), "2");
//! # });
//! ```

mod error;
mod memory;
mod traits;

pub use error::{Cardinality, StoreError, StoreResult};
pub use memory::MemoryEngine;
pub use traits::{BoxedCursor, Record, RecordCursor, StorageEngine};
