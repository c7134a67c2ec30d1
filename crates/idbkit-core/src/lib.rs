//! idbkit Core
//!
//! Typed, paginated, query-capable access to key-value object stores such as
//! the browser's IndexedDB. Designed to run identically in browser (WASM) and
//! native environments: the browser boundary lives in `idbkit-indexeddb`, and
//! [`MemoryEngine`] serves the same protocol in-process.
//!
//! # Layers
//!
//! - [`storage`] - the [`StorageEngine`] boundary and the in-memory engine
//! - [`batch`] - the batch request/result contract, the shared cursor walk,
//!   and [`BatchPager`] which drives one continuation chain
//! - [`query`] - lazy [`Query`] nodes (filter, map, order, skip, take, page)
//! - [`discriminator`] - which records belong to which result type
//!
//! # Features
//!
//! - `subscriber` - `logging::init` via tracing-subscriber (default)
//! - `wasm` - WASM-compatible build
//!
//! # Example
//!
//! ```rust
//! # futures::executor::block_on(async {
//! use std::rc::Rc;
//! use idbkit_core::{MemoryEngine, Store, StoreIdentity, TypeDiscriminator};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct Note {
//!     id: i64,
//!     text: String,
//! }
//! impl TypeDiscriminator for Note {}
//!
//! let store = Store::new(Rc::new(MemoryEngine::new()), StoreIdentity::new("notes"));
//! store.open().await.unwrap();
//! store.put(&Note { id: 1, text: "buy milk".into() }).await;
//! store.put(&Note { id: 2, text: "call bob".into() }).await;
//!
//! let texts = store
//!     .query::<Note>()
//!     .filter(|n| n.text.contains("milk"))
//!     .map(|n| n.text)
//!     .to_list()
//!     .await;
//! assert_eq!(texts, vec!["buy milk".to_string()]);
//! # });
//! ```

pub mod batch;
pub mod cancel;
pub mod config;
pub mod discriminator;
pub mod identity;
pub mod key;
pub mod logging;
pub mod query;
pub mod storage;
pub mod store;

// Re-export main types at crate root
pub use batch::{BatchPager, BatchRequest, BatchResult, PagerState, DEFAULT_BATCH_CEILING};
pub use cancel::CancellationToken;
pub use config::EngineConfig;
pub use discriminator::{Discriminator, DiscriminatorScheme, TypeDiscriminator};
pub use identity::{StoreIdentity, StoreIdentityBuilder};
pub use key::{ContinuationKey, Key};
pub use query::{OrderedQuery, Page, Query};
pub use storage::{
    Cardinality, MemoryEngine, Record, RecordCursor, StorageEngine, StoreError, StoreResult,
};
pub use store::Store;
