//! Configuration
//!
//! Stores can be declared in JSON instead of being registered in code:
//!
//! ```json
//! {
//!   "stores": [
//!     { "name": "default", "backend": { "type": "memory" } },
//!     { "name": "uploads", "root_path": "tenant-a", "backend": { "type": "disk", "base_dir": "/var/lib/uploads" } },
//!     { "name": "objects", "backend": { "type": "object_memory", "page_size": 500 } }
//!   ]
//! }
//! ```
//!
//! A `root_path` is always treated as a directory, with or without the
//! trailing slash.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::adapter::object_store::{MemoryObjectClient, ObjectClient};
use crate::adapter::{DiskAdapter, MemoryAdapter, ObjectStoreAdapter, StorageAdapter};
use crate::error::{Error, Result};
use crate::path::StoragePath;
use crate::registry::DEFAULT_STORE;

/// Top-level configuration: the list of stores to register.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(default)]
    pub stores: Vec<StoreConfig>,
}

/// One store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    #[serde(default = "default_store_name")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_path: Option<String>,
    pub backend: BackendConfig,
}

fn default_store_name() -> String {
    DEFAULT_STORE.to_string()
}

/// Backend selection, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendConfig {
    /// In-process tree store.
    Memory,
    /// Local directory.
    Disk { base_dir: PathBuf },
    /// In-process object store behind the object-store adapter.
    ObjectMemory {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        page_size: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bulk_delete_limit: Option<usize>,
    },
    /// S3 bucket, credentials from the environment.
    #[cfg(feature = "s3")]
    S3 { bucket: String },
}

impl StorageConfig {
    /// Parse a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for malformed JSON or unknown fields.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|err| Error::Config(err.to_string()))
    }

    /// Read and parse a JSON file.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|err| Error::Config(format!("cannot read {}: {err}", path.display())))?;
        Self::from_json(&json)
    }
}

impl StoreConfig {
    /// Parsed root path, always a directory.
    pub fn root_path(&self) -> Result<Option<StoragePath>> {
        self.root_path
            .as_deref()
            .map(|raw| StoragePath::parse(raw).map(|path| path.as_directory()))
            .transpose()
    }
}

impl BackendConfig {
    /// Instantiate the adapter this backend describes.
    pub async fn build_adapter(&self) -> Result<Arc<dyn StorageAdapter>> {
        let adapter: Arc<dyn StorageAdapter> = match self {
            Self::Memory => Arc::new(MemoryAdapter::new()),
            Self::Disk { base_dir } => Arc::new(DiskAdapter::new(base_dir.clone())),
            Self::ObjectMemory {
                page_size,
                bulk_delete_limit,
            } => {
                let mut client = MemoryObjectClient::new();
                if let Some(page_size) = page_size {
                    client = client.with_page_size(*page_size);
                }
                if let Some(limit) = bulk_delete_limit {
                    client = client.with_bulk_delete_limit(*limit);
                }
                let client: Arc<dyn ObjectClient> = Arc::new(client);
                Arc::new(ObjectStoreAdapter::new(client))
            }
            #[cfg(feature = "s3")]
            Self::S3 { bucket } => {
                let client = crate::adapter::object_store::S3Client::from_env(bucket.clone()).await;
                Arc::new(ObjectStoreAdapter::new(Arc::new(client)))
            }
        };
        Ok(adapter)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_backend() {
        let config = StorageConfig::from_json(
            r#"{
                "stores": [
                    { "backend": { "type": "memory" } },
                    { "name": "files", "root_path": "tenant", "backend": { "type": "disk", "base_dir": "/tmp/files" } },
                    { "name": "objects", "backend": { "type": "object_memory", "bulk_delete_limit": 10 } }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.stores.len(), 3);
        assert_eq!(config.stores[0].name, DEFAULT_STORE);
        assert_eq!(config.stores[0].backend, BackendConfig::Memory);
        assert_eq!(
            config.stores[1].backend,
            BackendConfig::Disk {
                base_dir: PathBuf::from("/tmp/files")
            }
        );
        assert_eq!(
            config.stores[2].backend,
            BackendConfig::ObjectMemory {
                page_size: None,
                bulk_delete_limit: Some(10)
            }
        );
    }

    #[test]
    fn root_path_is_a_directory() {
        let config = StorageConfig::from_json(
            r#"{ "stores": [ { "root_path": "/tenant/a", "backend": { "type": "memory" } } ] }"#,
        )
        .unwrap();
        let root = config.stores[0].root_path().unwrap().unwrap();
        assert_eq!(root.normalized(), "tenant/a/");
        assert!(root.is_directory());
    }

    #[test]
    fn rejects_bad_documents() {
        let err = StorageConfig::from_json(r#"{ "stores": [ { "backend": { "type": "ftp" } } ] }"#)
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = StorageConfig::from_json(r#"{ "store": [] }"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn reads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        tokio::fs::write(&path, r#"{ "stores": [ { "backend": { "type": "memory" } } ] }"#)
            .await
            .unwrap();
        let config = StorageConfig::from_path(&path).await.unwrap();
        assert_eq!(config.stores.len(), 1);

        let err = StorageConfig::from_path(dir.path().join("missing.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
