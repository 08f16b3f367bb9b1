//! Object store client trait.
//!
//! [`ObjectClient`] is the raw key/value surface of a bucket: no directories,
//! no path semantics. [`ObjectStoreAdapter`](super::ObjectStoreAdapter)
//! builds the storage API on top of it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::error::BoxError;

/// Result type for raw client calls. The adapter wraps failures.
pub type ClientResult<T> = std::result::Result<T, BoxError>;

/// Default maximum number of keys a single bulk-delete call accepts.
pub const DEFAULT_BULK_DELETE_LIMIT: usize = 1000;

/// Metadata of one stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Object key
    pub key: String,
    /// Size in bytes
    pub size: u64,
    /// MIME type, when the listing or head call reports it
    pub content_type: Option<String>,
    /// Last modification time
    pub last_modified: Option<DateTime<Utc>>,
}

/// Object body plus metadata.
#[derive(Debug, Clone)]
pub struct ObjectData {
    pub meta: ObjectMeta,
    pub body: Vec<u8>,
}

/// One page of a prefix listing.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    /// Objects in key order
    pub objects: Vec<ObjectMeta>,
    /// Token for the next page; `None` when the listing is complete
    pub next_token: Option<String>,
}

/// Raw object store operations.
///
/// # Contract
///
/// - `head` / `get` return `Ok(None)` for a missing key, never an error
/// - `list_page` returns keys starting with `prefix` in ascending order
/// - `delete_many` accepts at most [`bulk_delete_limit`](Self::bulk_delete_limit) keys
#[async_trait]
pub trait ObjectClient: Send + Sync {
    /// Fetch metadata of a key.
    async fn head(&self, key: &str) -> ClientResult<Option<ObjectMeta>>;

    /// Fetch an object.
    async fn get(&self, key: &str) -> ClientResult<Option<ObjectData>>;

    /// Store an object, replacing any existing one.
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> ClientResult<()>;

    /// Server-side copy.
    async fn copy(&self, source: &str, destination: &str) -> ClientResult<()>;

    /// Delete one key. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> ClientResult<()>;

    /// Delete a batch of keys in one request.
    async fn delete_many(&self, keys: &[String]) -> ClientResult<()>;

    /// List keys under `prefix`, resuming after `token`.
    async fn list_page(
        &self,
        prefix: &str,
        token: Option<String>,
        max_keys: Option<usize>,
    ) -> ClientResult<ListPage>;

    /// Pre-signed GET URL valid for `expires_in`.
    async fn presign_get(&self, key: &str, expires_in: Duration) -> ClientResult<String>;

    /// Maximum keys per [`delete_many`](Self::delete_many) call.
    fn bulk_delete_limit(&self) -> usize {
        DEFAULT_BULK_DELETE_LIMIT
    }
}
