//! IndexedDB storage engine for idbkit (browser WASM)
//!
//! [`IndexedDbEngine`] implements the `idbkit_core::StorageEngine` contract on
//! top of `web-sys`, so the batched cursor protocol and lazy queries from
//! `idbkit-core` run against a real browser database.
//!
//! # Schema
//!
//! Each logical store is one object store whose `keyPath` comes from the
//! [`StoreIdentity`](idbkit_core::StoreIdentity). Stores missing from an
//! existing database are created by reopening it one version higher, unless
//! the identity pins a version. Records are stored as the structured clone of
//! their JSON form.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::rc::Rc;
//! use idbkit_core::{Store, StoreIdentity};
//! use idbkit_indexeddb::IndexedDbEngine;
//!
//! let identity = StoreIdentity::builder("app").store("notes").build();
//! let store = Store::new(Rc::new(IndexedDbEngine::new()), identity);
//! store.open().await?;
//!
//! store.put_raw(r#"{"id": 1, "text": "hello"}"#).await;
//! let first_page = store.query::<serde_json::Value>().page(1, 20).await;
//! ```

pub mod convert;
pub mod engine;
pub mod error;
pub mod idb;

pub use engine::{IdbRecordCursor, IndexedDbEngine};
pub use error::{IndexedDbError, Result};
