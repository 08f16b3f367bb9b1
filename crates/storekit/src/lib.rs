//! Storekit - One file and directory API over heterogeneous storage backends
//!
//! Callers address files and directories by logical [`StoragePath`]s. Named
//! stores map those paths onto a backend, optionally below a root path:
//!
//! - [`MemoryAdapter`]: in-process tree, for tests and ephemeral data
//! - [`DiskAdapter`]: a local directory
//! - [`ObjectStoreAdapter`]: directory emulation over a flat object store
//!   ([`MemoryObjectClient`], or S3 with the `s3` feature)
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use storekit::{DirectoryRequest, FileRequest, MemoryAdapter, Storage, StoragePath, WriteFileRequest};
//!
//! #[tokio::main]
//! async fn main() -> storekit::Result<()> {
//!     let storage = Storage::builder()
//!         .register_with_root("default", Arc::new(MemoryAdapter::new()), StoragePath::parse("tenant/")?)
//!         .build()?;
//!
//!     let path = StoragePath::parse("docs/readme.md")?;
//!     storage.files().write(WriteFileRequest::new(path.clone(), "hello")).await?;
//!
//!     let file = storage.files().read(FileRequest::new(path)).await?;
//!     assert_eq!(file.content, b"hello");
//!
//!     let entries = storage
//!         .directories()
//!         .list_contents(DirectoryRequest::new(StoragePath::parse("docs/")?))
//!         .await?;
//!     assert_eq!(entries.len(), 2);
//!     Ok(())
//! }
//! ```

mod adapter;
mod config;
mod error;
mod manager;
mod path;
mod registry;

pub use adapter::object_store::{
    ClientResult, DEFAULT_BULK_DELETE_LIMIT, DEFAULT_PAGE_SIZE, DIRECTORY_MARKER, ListPage,
    MemoryObjectClient, ObjectClient, ObjectData, ObjectMeta,
};
#[cfg(feature = "s3")]
pub use adapter::object_store::S3Client;
pub use adapter::{
    ContentVisitor, DEFAULT_CONTENT_TYPE, DirectoryInfo, DiskAdapter, FileContent, FileInfo,
    MemoryAdapter, ObjectStoreAdapter, StorageAdapter,
};
pub use config::{BackendConfig, StorageConfig, StoreConfig};
pub use error::{BoxError, Error, Result};
pub use manager::{
    DirectoryManager, DirectoryRequest, DirectoryTransferRequest, FileManager, FileRequest,
    PublicUrl, PublicUrlRequest, TransferRequest, WriteFileRequest,
};
pub use path::{SEPARATOR, StoragePath};
pub use registry::{DEFAULT_STORE, Store, StoreRegistry};

// Re-exported so custom adapters and callers need no extra dependencies.
pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;

use std::sync::Arc;

/// Main entry point: the configured stores plus the managers over them.
#[derive(Clone)]
pub struct Storage {
    registry: Arc<StoreRegistry>,
    files: FileManager,
    directories: DirectoryManager,
}

impl Storage {
    /// Create a builder for registering stores.
    pub fn builder() -> StorageBuilder {
        StorageBuilder::default()
    }

    /// Build storage from a parsed configuration.
    pub async fn from_config(config: &StorageConfig) -> Result<Self> {
        let mut builder = Self::builder();
        for store in &config.stores {
            let adapter = store.backend.build_adapter().await?;
            builder = match store.root_path()? {
                Some(root) => builder.register_with_root(&store.name, adapter, root),
                None => builder.register(&store.name, adapter),
            };
        }
        builder.build()
    }

    /// File operations.
    pub fn files(&self) -> &FileManager {
        &self.files
    }

    /// Directory operations.
    pub fn directories(&self) -> &DirectoryManager {
        &self.directories
    }

    /// Look up a registered store.
    pub fn store(&self, name: &str) -> Result<Arc<Store>> {
        self.registry.get(name)
    }

    /// Names of all registered stores.
    pub fn store_names(&self) -> Vec<String> {
        self.registry.names()
    }
}

/// Builder for [`Storage`].
#[derive(Default)]
pub struct StorageBuilder {
    stores: Vec<(String, Arc<dyn StorageAdapter>, Option<StoragePath>)>,
}

impl StorageBuilder {
    /// Register a store that sees the whole adapter.
    pub fn register(mut self, name: impl Into<String>, adapter: Arc<dyn StorageAdapter>) -> Self {
        self.stores.push((name.into(), adapter, None));
        self
    }

    /// Register a store confined below `root` on its adapter.
    pub fn register_with_root(
        mut self,
        name: impl Into<String>,
        adapter: Arc<dyn StorageAdapter>,
        root: StoragePath,
    ) -> Self {
        self.stores.push((name.into(), adapter, Some(root)));
        self
    }

    /// Build the storage.
    ///
    /// # Errors
    ///
    /// Fails on duplicate store names and non-directory root paths.
    pub fn build(self) -> Result<Storage> {
        let mut registry = StoreRegistry::new();
        for (name, adapter, root) in self.stores {
            registry.register(name, adapter, root)?;
        }
        let registry = Arc::new(registry);
        Ok(Storage {
            files: FileManager::new(Arc::clone(&registry)),
            directories: DirectoryManager::new(Arc::clone(&registry)),
            registry,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_builder_registers_stores() {
        let storage = Storage::builder()
            .register("default", Arc::new(MemoryAdapter::new()))
            .register_with_root(
                "Scoped",
                Arc::new(MemoryAdapter::new()),
                StoragePath::parse("t/").unwrap(),
            )
            .build()
            .unwrap();
        assert_eq!(storage.store_names(), vec!["Scoped", "default"]);
        assert!(storage.store("scoped").unwrap().root_path().is_some());
    }

    #[tokio::test]
    async fn test_builder_rejects_duplicates() {
        let result = Storage::builder()
            .register("a", Arc::new(MemoryAdapter::new()))
            .register("A", Arc::new(MemoryAdapter::new()))
            .build();
        assert!(matches!(result, Err(Error::StoreAlreadyRegistered(_))));
    }

    #[tokio::test]
    async fn test_from_config() {
        let config = StorageConfig::from_json(
            r#"{ "stores": [
                { "backend": { "type": "memory" } },
                { "name": "objects", "root_path": "bucket-root", "backend": { "type": "object_memory" } }
            ] }"#,
        )
        .unwrap();
        let storage = Storage::from_config(&config).await.unwrap();

        let path = StoragePath::parse("a/b.txt").unwrap();
        storage
            .files()
            .write(WriteFileRequest::new(path.clone(), "x").store("objects"))
            .await
            .unwrap();
        assert!(
            storage
                .files()
                .exists(FileRequest::new(path).store("objects"))
                .await
                .unwrap()
        );
        let store = storage.store("objects").unwrap();
        assert_eq!(store.root_path().unwrap().normalized(), "bucket-root/");
    }
}
