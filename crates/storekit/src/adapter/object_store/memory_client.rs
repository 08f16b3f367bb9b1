//! In-process object store.
//!
//! [`MemoryObjectClient`] behaves like a bucket: flat keys, bounded listing
//! pages with continuation tokens, and a bulk-delete call that refuses more
//! than its configured limit. It backs the `object_memory` store type and the
//! object-store adapter tests.

// RwLock.read()/write().unwrap() only panics on lock poisoning (prior panic
// while holding lock). This is intentional - corrupted state should not propagate.
#![allow(clippy::unwrap_used)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::io::Error as IoError;
use std::ops::Bound;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::client::{
    ClientResult, DEFAULT_BULK_DELETE_LIMIT, ListPage, ObjectClient, ObjectData, ObjectMeta,
};

/// Default number of keys per listing page, matching common providers.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
struct StoredObject {
    body: Vec<u8>,
    content_type: String,
    last_modified: DateTime<Utc>,
}

impl StoredObject {
    fn meta(&self, key: &str) -> ObjectMeta {
        ObjectMeta {
            key: key.to_string(),
            size: self.body.len() as u64,
            content_type: Some(self.content_type.clone()),
            last_modified: Some(self.last_modified),
        }
    }
}

/// Object store held in process memory.
pub struct MemoryObjectClient {
    objects: RwLock<BTreeMap<String, StoredObject>>,
    page_size: usize,
    bulk_delete_limit: usize,
    base_url: String,
    failing: RwLock<HashSet<&'static str>>,
    list_calls: AtomicUsize,
    bulk_delete_calls: AtomicUsize,
}

impl Default for MemoryObjectClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryObjectClient {
    /// Create an empty store with provider-like defaults.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            page_size: DEFAULT_PAGE_SIZE,
            bulk_delete_limit: DEFAULT_BULK_DELETE_LIMIT,
            base_url: "memory://bucket".to_string(),
            failing: RwLock::new(HashSet::new()),
            list_calls: AtomicUsize::new(0),
            bulk_delete_calls: AtomicUsize::new(0),
        }
    }

    /// Set the maximum number of keys per listing page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Set the maximum number of keys per bulk delete.
    pub fn with_bulk_delete_limit(mut self, limit: usize) -> Self {
        self.bulk_delete_limit = limit.max(1);
        self
    }

    /// Set the base URL used for pre-signed links.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Make every call of `operation` (`"put"`, `"copy"`, `"delete_many"`,
    /// ...) fail from now on.
    pub fn fail_on(&self, operation: &'static str) {
        self.failing.write().unwrap().insert(operation);
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().unwrap().len()
    }

    /// Whether the store holds no objects.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All keys, in order.
    pub fn keys(&self) -> Vec<String> {
        self.objects.read().unwrap().keys().cloned().collect()
    }

    /// Number of `list_page` calls served.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::Relaxed)
    }

    /// Number of `delete_many` calls served.
    pub fn bulk_delete_calls(&self) -> usize {
        self.bulk_delete_calls.load(Ordering::Relaxed)
    }

    fn check(&self, operation: &'static str) -> ClientResult<()> {
        if self.failing.read().unwrap().contains(operation) {
            return Err(IoError::other(format!("injected failure in {operation}")).into());
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectClient for MemoryObjectClient {
    async fn head(&self, key: &str) -> ClientResult<Option<ObjectMeta>> {
        self.check("head")?;
        let objects = self.objects.read().unwrap();
        Ok(objects.get(key).map(|object| object.meta(key)))
    }

    async fn get(&self, key: &str) -> ClientResult<Option<ObjectData>> {
        self.check("get")?;
        let objects = self.objects.read().unwrap();
        Ok(objects.get(key).map(|object| ObjectData {
            meta: object.meta(key),
            body: object.body.clone(),
        }))
    }

    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> ClientResult<()> {
        self.check("put")?;
        let mut objects = self.objects.write().unwrap();
        objects.insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.to_string(),
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn copy(&self, source: &str, destination: &str) -> ClientResult<()> {
        self.check("copy")?;
        let mut objects = self.objects.write().unwrap();
        let mut object = objects
            .get(source)
            .cloned()
            .ok_or_else(|| IoError::other(format!("no such key: {source}")))?;
        object.last_modified = Utc::now();
        objects.insert(destination.to_string(), object);
        Ok(())
    }

    async fn delete(&self, key: &str) -> ClientResult<()> {
        self.check("delete")?;
        self.objects.write().unwrap().remove(key);
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> ClientResult<()> {
        self.check("delete_many")?;
        if keys.len() > self.bulk_delete_limit {
            return Err(IoError::other(format!(
                "bulk delete of {} keys exceeds limit of {}",
                keys.len(),
                self.bulk_delete_limit
            ))
            .into());
        }
        self.bulk_delete_calls.fetch_add(1, Ordering::Relaxed);
        let mut objects = self.objects.write().unwrap();
        for key in keys {
            objects.remove(key);
        }
        Ok(())
    }

    async fn list_page(
        &self,
        prefix: &str,
        token: Option<String>,
        max_keys: Option<usize>,
    ) -> ClientResult<ListPage> {
        self.check("list")?;
        self.list_calls.fetch_add(1, Ordering::Relaxed);

        let limit = max_keys.unwrap_or(self.page_size).clamp(1, self.page_size);
        let lower = match token {
            Some(token) => Bound::Excluded(token),
            None => Bound::Unbounded,
        };

        let objects = self.objects.read().unwrap();
        let mut matching = objects
            .range::<String, _>((lower, Bound::Unbounded))
            .skip_while(|(key, _)| key.as_str() < prefix)
            .take_while(|(key, _)| key.starts_with(prefix));

        let page: Vec<ObjectMeta> = matching
            .by_ref()
            .take(limit)
            .map(|(key, object)| object.meta(key))
            .collect();
        let next_token = match matching.next() {
            Some(_) => page.last().map(|object| object.key.clone()),
            None => None,
        };

        Ok(ListPage {
            objects: page,
            next_token,
        })
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> ClientResult<String> {
        self.check("presign")?;
        Ok(format!(
            "{}/{}?expires_in={}",
            self.base_url.trim_end_matches('/'),
            key,
            expires_in.as_secs()
        ))
    }

    fn bulk_delete_limit(&self) -> usize {
        self.bulk_delete_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn list_pages_with_tokens() {
        let client = MemoryObjectClient::new().with_page_size(2);
        for key in ["a/1", "a/2", "a/3", "b/1"] {
            client.put(key, Vec::new(), "text/plain").await.unwrap();
        }

        let first = client.list_page("a/", None, None).await.unwrap();
        assert_eq!(first.objects.len(), 2);
        assert_eq!(first.next_token.as_deref(), Some("a/2"));

        let second = client.list_page("a/", first.next_token, None).await.unwrap();
        let keys: Vec<&str> = second.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["a/3"]);
        assert!(second.next_token.is_none());
    }

    #[tokio::test]
    async fn list_respects_max_keys() {
        let client = MemoryObjectClient::new();
        for key in ["a/1", "a/2"] {
            client.put(key, Vec::new(), "text/plain").await.unwrap();
        }
        let page = client.list_page("a/", None, Some(1)).await.unwrap();
        assert_eq!(page.objects.len(), 1);
        assert!(page.next_token.is_some());
    }

    #[tokio::test]
    async fn bulk_delete_enforces_limit() {
        let client = MemoryObjectClient::new().with_bulk_delete_limit(2);
        let keys: Vec<String> = (0..3).map(|i| format!("k{i}")).collect();
        for key in &keys {
            client.put(key, Vec::new(), "x").await.unwrap();
        }
        assert!(client.delete_many(&keys).await.is_err());
        client.delete_many(&keys[..2]).await.unwrap();
        assert_eq!(client.keys(), vec!["k2".to_string()]);
        assert_eq!(client.bulk_delete_calls(), 1);
    }

    #[tokio::test]
    async fn copy_missing_key_fails() {
        let client = MemoryObjectClient::new();
        assert!(client.copy("missing", "dst").await.is_err());
        assert!(client.head("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn injected_failures() {
        let client = MemoryObjectClient::new();
        client.fail_on("put");
        let err = client.put("k", Vec::new(), "x").await.unwrap_err();
        assert!(err.to_string().contains("injected failure in put"));
    }
}
