//! Store registration and lookup.
//!
//! A [`Store`] binds a name to an adapter and an optional root path. Stores
//! are registered once while the [`Storage`](crate::Storage) is configured
//! and looked up by name on every request.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::adapter::StorageAdapter;
use crate::error::{Error, Result};
use crate::path::StoragePath;

/// Store name used when a request does not name one.
pub const DEFAULT_STORE: &str = "default";

/// A named adapter, optionally scoped below a root path.
pub struct Store {
    name: String,
    adapter: Arc<dyn StorageAdapter>,
    root_path: Option<StoragePath>,
}

impl Store {
    /// Name the store was registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backing adapter.
    pub fn adapter(&self) -> &Arc<dyn StorageAdapter> {
        &self.adapter
    }

    /// Directory every request path is placed beneath.
    pub fn root_path(&self) -> Option<&StoragePath> {
        self.root_path.as_ref()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.name)
            .field("root_path", &self.root_path)
            .finish_non_exhaustive()
    }
}

/// Stores keyed by lowercased name.
#[derive(Default, Debug)]
pub struct StoreRegistry {
    stores: HashMap<String, Arc<Store>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a store.
    ///
    /// # Errors
    ///
    /// - [`Error::StoreAlreadyRegistered`] if the name is taken, ignoring case
    /// - [`Error::InvalidRequest`] if `root_path` is not a directory path
    pub fn register(
        &mut self,
        name: impl Into<String>,
        adapter: Arc<dyn StorageAdapter>,
        root_path: Option<StoragePath>,
    ) -> Result<Arc<Store>> {
        let name = name.into();
        let key = name.to_lowercase();
        if self.stores.contains_key(&key) {
            return Err(Error::StoreAlreadyRegistered(name));
        }
        if let Some(root) = root_path.as_ref().filter(|root| !root.is_directory()) {
            return Err(Error::InvalidRequest(format!(
                "root path '{root}' of store '{name}' must be a directory path"
            )));
        }
        // The root itself is no scoping at all.
        let root_path = root_path.filter(|root| !root.is_root());

        tracing::info!(
            store = %name,
            root_path = root_path.as_ref().map(|r| r.normalized()).unwrap_or(""),
            "registered store"
        );

        let store = Arc::new(Store {
            name,
            adapter,
            root_path,
        });
        self.stores.insert(key, Arc::clone(&store));
        Ok(store)
    }

    /// Look up a store by name, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreNotFound`] for an unregistered name.
    pub fn get(&self, name: &str) -> Result<Arc<Store>> {
        self.stores
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| Error::StoreNotFound(name.to_string()))
    }

    /// Registered store names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.stores.values().map(|s| s.name.clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}
