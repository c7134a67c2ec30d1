//! Store identity
//!
//! A [`StoreIdentity`] addresses one physical object store. It carries no
//! state beyond the tuple itself; two identities with the same database,
//! store and version address the same store, whatever their key path says.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Key path used when none is configured.
pub const DEFAULT_KEY_PATH: &str = "id";

/// Identity of an object store: database, store name, schema version, key path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreIdentity {
    database: String,
    store: String,
    version: Option<u32>,
    key_path: String,
}

impl StoreIdentity {
    /// Identity whose store shares the database name, with the default key path.
    pub fn new(database: impl Into<String>) -> Self {
        StoreIdentityBuilder::new(database).build()
    }

    pub fn builder(database: impl Into<String>) -> StoreIdentityBuilder {
        StoreIdentityBuilder::new(database)
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn store(&self) -> &str {
        &self.store
    }

    /// Pinned schema version, if any. `None` opens whatever version exists.
    pub fn version(&self) -> Option<u32> {
        self.version
    }

    pub fn key_path(&self) -> &str {
        &self.key_path
    }
}

impl PartialEq for StoreIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.database == other.database
            && self.store == other.store
            && self.version == other.version
    }
}

impl Eq for StoreIdentity {}

impl Hash for StoreIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.database.hash(state);
        self.store.hash(state);
        self.version.hash(state);
    }
}

/// Builder for [`StoreIdentity`].
#[derive(Debug, Clone)]
pub struct StoreIdentityBuilder {
    database: String,
    store: Option<String>,
    version: Option<u32>,
    key_path: Option<String>,
}

impl StoreIdentityBuilder {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            store: None,
            version: None,
            key_path: None,
        }
    }

    pub fn store(mut self, store: impl Into<String>) -> Self {
        self.store = Some(store.into());
        self
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    pub fn key_path(mut self, key_path: impl Into<String>) -> Self {
        self.key_path = Some(key_path.into());
        self
    }

    pub fn build(self) -> StoreIdentity {
        let store = self.store.unwrap_or_else(|| self.database.clone());
        StoreIdentity {
            database: self.database,
            store,
            version: self.version,
            key_path: self
                .key_path
                .unwrap_or_else(|| DEFAULT_KEY_PATH.to_string()),
        }
    }
}
