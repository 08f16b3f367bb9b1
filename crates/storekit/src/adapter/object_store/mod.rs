//! Object-store adapter.
//!
//! Object stores have no directories, only keys. [`ObjectStoreAdapter`]
//! emulates them:
//!
//! | Operation | Emulation |
//! |-----------|-----------|
//! | directory exists | a one-key listing under `dir/` is non-empty |
//! | create directory | zero-byte `dir/.keep` marker object |
//! | list / iterate | page through keys, synthesize ancestor directory rows |
//! | copy / move directory | per-key provider copy; move bulk-deletes the sources |
//! | delete directory | list, bulk-delete in provider-sized batches, repeat |
//!
//! Existence pre-checks raise `NotFound` / `AlreadyExists` directly. Every
//! provider call failure is wrapped in `ProviderOperationFailed` where the
//! call is made, never further out.

mod client;
mod memory_client;
mod pager;
#[cfg(feature = "s3")]
mod s3;

pub use client::{
    ClientResult, DEFAULT_BULK_DELETE_LIMIT, ListPage, ObjectClient, ObjectData, ObjectMeta,
};
pub use memory_client::{DEFAULT_PAGE_SIZE, MemoryObjectClient};
#[cfg(feature = "s3")]
pub use s3::S3Client;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::try_join_all;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::traits::{
    ContentVisitor, DEFAULT_CONTENT_TYPE, DirectoryInfo, FileContent, FileInfo, StorageAdapter,
};
use super::{cancellable, ensure_active};
use crate::error::{Error, Result};
use crate::path::StoragePath;
use pager::{ObjectPager, batches};

/// Name of the zero-byte object that makes an empty directory visible.
pub const DIRECTORY_MARKER: &str = ".keep";

/// Storage adapter over a flat object store.
pub struct ObjectStoreAdapter {
    client: Arc<dyn ObjectClient>,
}

/// Run one provider call: cancellable, failures wrapped once.
async fn provider_call<T, F>(
    cancel: &CancellationToken,
    operation: &'static str,
    fut: F,
) -> Result<T>
where
    F: Future<Output = ClientResult<T>>,
{
    cancellable(cancel, async { fut.await.map_err(Error::provider(operation)) }).await
}

fn file_info(path: &StoragePath, meta: &ObjectMeta) -> FileInfo {
    FileInfo {
        path: path.clone(),
        size: meta.size,
        content_type: meta
            .content_type
            .clone()
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
        last_modified: meta.last_modified,
    }
}

impl ObjectStoreAdapter {
    /// Create an adapter over the given client.
    pub fn new(client: Arc<dyn ObjectClient>) -> Self {
        Self { client }
    }

    /// The underlying client.
    pub fn client(&self) -> &Arc<dyn ObjectClient> {
        &self.client
    }

    async fn head(
        &self,
        path: &StoragePath,
        cancel: &CancellationToken,
    ) -> Result<Option<ObjectMeta>> {
        provider_call(cancel, "head_object", self.client.head(path.normalized())).await
    }

    async fn directory_present(
        &self,
        path: &StoragePath,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        if path.is_root() {
            return Ok(true);
        }
        let page = provider_call(
            cancel,
            "list_objects",
            self.client.list_page(path.normalized(), None, Some(1)),
        )
        .await?;
        Ok(!page.objects.is_empty())
    }

    /// A directory or a file occupies this directory path's location.
    async fn occupied(&self, path: &StoragePath, cancel: &CancellationToken) -> Result<bool> {
        if self.directory_present(path, cancel).await? {
            return Ok(true);
        }
        match path.as_file() {
            Some(file) => Ok(self.head(&file, cancel).await?.is_some()),
            None => Ok(false),
        }
    }

    /// Copy every key under `source` to the matching key under
    /// `destination`. Returns the source keys copied.
    async fn copy_prefix(
        &self,
        source: &StoragePath,
        destination: &StoragePath,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        let mut copied = Vec::new();
        let mut pager = ObjectPager::new(self.client.as_ref(), source.normalized());
        while let Some(page) = pager.next_page(cancel).await? {
            for object in page {
                let target = object
                    .key
                    .replacen(source.normalized(), destination.normalized(), 1);
                provider_call(cancel, "copy_object", self.client.copy(&object.key, &target))
                    .await?;
                copied.push(object.key);
            }
        }
        tracing::debug!(
            source = %source,
            destination = %destination,
            objects = copied.len(),
            "copied prefix"
        );
        Ok(copied)
    }

    /// Bulk-delete keys in provider-sized batches, issued concurrently.
    async fn delete_keys(&self, keys: &[String], cancel: &CancellationToken) -> Result<()> {
        let limit = self.client.bulk_delete_limit();
        let requests = batches(keys, limit).map(|batch| async move {
            self.client
                .delete_many(batch)
                .await
                .map_err(Error::provider("delete_objects"))
        });
        tracing::trace!(keys = keys.len(), limit, "bulk delete");
        cancellable(cancel, async { try_join_all(requests).await.map(|_| ()) }).await
    }

    async fn transfer_checks(
        &self,
        source: &StoragePath,
        destination: &StoragePath,
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> Result<ObjectMeta> {
        let meta = self
            .head(source, cancel)
            .await?
            .ok_or_else(|| Error::not_found(source))?;
        if !overwrite && self.head(destination, cancel).await?.is_some() {
            return Err(Error::already_exists(destination));
        }
        Ok(meta)
    }

    async fn directory_transfer_checks(
        &self,
        source: &StoragePath,
        destination: &StoragePath,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if !self.directory_present(source, cancel).await? {
            return Err(Error::not_found(source));
        }
        if self.occupied(destination, cancel).await? {
            return Err(Error::already_exists(destination));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for ObjectStoreAdapter {
    async fn file_exists(&self, path: &StoragePath, cancel: &CancellationToken) -> Result<bool> {
        Ok(self.head(path, cancel).await?.is_some())
    }

    async fn get_file(&self, path: &StoragePath, cancel: &CancellationToken) -> Result<FileInfo> {
        let meta = self
            .head(path, cancel)
            .await?
            .ok_or_else(|| Error::not_found(path))?;
        Ok(file_info(path, &meta))
    }

    async fn touch_file(
        &self,
        path: &StoragePath,
        cancel: &CancellationToken,
    ) -> Result<FileInfo> {
        // Object stores overwrite unconditionally.
        provider_call(
            cancel,
            "put_object",
            self.client
                .put(path.normalized(), Vec::new(), DEFAULT_CONTENT_TYPE),
        )
        .await?;
        Ok(FileInfo::new(path.clone(), 0, DEFAULT_CONTENT_TYPE))
    }

    async fn read_file(
        &self,
        path: &StoragePath,
        cancel: &CancellationToken,
    ) -> Result<FileContent> {
        let data = provider_call(cancel, "get_object", self.client.get(path.normalized()))
            .await?
            .ok_or_else(|| Error::not_found(path))?;
        Ok(FileContent {
            info: file_info(path, &data.meta),
            content: data.body,
        })
    }

    async fn write_file(
        &self,
        path: &StoragePath,
        content: Vec<u8>,
        content_type: Option<&str>,
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> Result<FileInfo> {
        if !overwrite && self.head(path, cancel).await?.is_some() {
            return Err(Error::already_exists(path));
        }
        let content_type = content_type.unwrap_or(DEFAULT_CONTENT_TYPE);
        let size = content.len() as u64;
        provider_call(
            cancel,
            "put_object",
            self.client.put(path.normalized(), content, content_type),
        )
        .await?;
        Ok(FileInfo::new(path.clone(), size, content_type))
    }

    async fn copy_file(
        &self,
        source: &StoragePath,
        destination: &StoragePath,
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> Result<FileInfo> {
        let meta = self
            .transfer_checks(source, destination, overwrite, cancel)
            .await?;
        provider_call(
            cancel,
            "copy_object",
            self.client
                .copy(source.normalized(), destination.normalized()),
        )
        .await?;
        let mut info = file_info(destination, &meta);
        info.last_modified = Some(Utc::now());
        Ok(info)
    }

    async fn move_file(
        &self,
        source: &StoragePath,
        destination: &StoragePath,
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> Result<FileInfo> {
        let meta = self
            .transfer_checks(source, destination, overwrite, cancel)
            .await?;
        provider_call(
            cancel,
            "copy_object",
            self.client
                .copy(source.normalized(), destination.normalized()),
        )
        .await?;
        provider_call(
            cancel,
            "delete_object",
            self.client.delete(source.normalized()),
        )
        .await?;
        Ok(file_info(destination, &meta))
    }

    async fn delete_file(&self, path: &StoragePath, cancel: &CancellationToken) -> Result<()> {
        if self.head(path, cancel).await?.is_none() {
            return Err(Error::not_found(path));
        }
        provider_call(cancel, "delete_object", self.client.delete(path.normalized())).await
    }

    async fn directory_exists(
        &self,
        path: &StoragePath,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        self.directory_present(path, cancel).await
    }

    async fn create_directory(
        &self,
        path: &StoragePath,
        cancel: &CancellationToken,
    ) -> Result<DirectoryInfo> {
        if self.occupied(path, cancel).await? {
            return Err(Error::already_exists(path));
        }
        let marker = format!("{}{}", path.normalized(), DIRECTORY_MARKER);
        provider_call(
            cancel,
            "put_object",
            self.client.put(&marker, Vec::new(), DEFAULT_CONTENT_TYPE),
        )
        .await?;
        Ok(DirectoryInfo::new(path.clone()))
    }

    async fn delete_directory(
        &self,
        path: &StoragePath,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if !self.directory_present(path, cancel).await? {
            return Err(Error::not_found(path));
        }
        let mut deleted = 0;
        loop {
            ensure_active(cancel)?;
            // Always restart from the first page: the previous one is gone.
            let mut pager = ObjectPager::new(self.client.as_ref(), path.normalized());
            let keys: Vec<String> = match pager.next_page(cancel).await? {
                Some(page) if !page.is_empty() => page.into_iter().map(|o| o.key).collect(),
                _ => break,
            };
            self.delete_keys(&keys, cancel).await?;
            deleted += keys.len();
        }
        tracing::debug!(path = %path, objects = deleted, "deleted directory");
        Ok(())
    }

    async fn copy_directory(
        &self,
        source: &StoragePath,
        destination: &StoragePath,
        cancel: &CancellationToken,
    ) -> Result<DirectoryInfo> {
        self.directory_transfer_checks(source, destination, cancel)
            .await?;
        self.copy_prefix(source, destination, cancel).await?;
        Ok(DirectoryInfo::new(destination.clone()))
    }

    async fn move_directory(
        &self,
        source: &StoragePath,
        destination: &StoragePath,
        cancel: &CancellationToken,
    ) -> Result<DirectoryInfo> {
        self.directory_transfer_checks(source, destination, cancel)
            .await?;
        let copied = self.copy_prefix(source, destination, cancel).await?;
        self.delete_keys(&copied, cancel).await?;
        Ok(DirectoryInfo::new(destination.clone()))
    }

    async fn iterate_contents(
        &self,
        path: &StoragePath,
        visitor: &mut ContentVisitor<'_>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if !self.directory_present(path, cancel).await? {
            return Err(Error::not_found(path));
        }

        let mut emitted: HashSet<StoragePath> = HashSet::new();
        let mut pager = ObjectPager::new(self.client.as_ref(), path.normalized());
        'pages: while let Some(page) = pager.next_page(cancel).await? {
            for object in page {
                let key = match StoragePath::parse(&object.key) {
                    Ok(key) => key,
                    Err(err) => {
                        tracing::warn!(key = %object.key, error = %err, "skipping object key");
                        continue;
                    }
                };
                // Ancestors first: they are the directory rows the store lacks.
                for entry in key.path_tree() {
                    if entry.is_within(path)
                        && emitted.insert(entry.clone())
                        && visitor(entry.clone()).is_break()
                    {
                        pager.stop();
                        continue 'pages;
                    }
                }
            }
        }
        Ok(())
    }

    async fn public_url(
        &self,
        path: &StoragePath,
        expiry: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<String> {
        if self.head(path, cancel).await?.is_none() {
            return Err(Error::not_found(path));
        }
        let expires_in = (expiry - Utc::now())
            .to_std()
            .map_err(|_| Error::InvalidRequest("expiry must be in the future".into()))?;
        provider_call(
            cancel,
            "presign_get",
            self.client.presign_get(path.normalized(), expires_in),
        )
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::ops::ControlFlow;

    fn p(raw: &str) -> StoragePath {
        StoragePath::parse(raw).unwrap()
    }

    fn adapter() -> (Arc<MemoryObjectClient>, ObjectStoreAdapter) {
        let client = Arc::new(MemoryObjectClient::new());
        (client.clone(), ObjectStoreAdapter::new(client))
    }

    async fn write(adapter: &ObjectStoreAdapter, path: &str) {
        adapter
            .write_file(&p(path), b"data".to_vec(), None, true, &CancellationToken::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_list_synthesizes_directories() {
        let (_, adapter) = adapter();
        let cancel = CancellationToken::new();
        write(&adapter, "a/file.txt").await;
        write(&adapter, "a/b/.config").await;
        write(&adapter, "a/c/d/.keep").await;
        write(&adapter, "outside.txt").await;

        let mut entries = adapter.list_contents(&p("a/"), &cancel).await.unwrap();
        entries.sort();
        let listed: Vec<(&str, bool)> = entries
            .iter()
            .map(|e| (e.normalized(), e.is_directory()))
            .collect();
        assert_eq!(
            listed,
            vec![
                ("a/", true),
                ("a/b/", true),
                ("a/b/.config", false),
                ("a/c/", true),
                ("a/c/d/", true),
                ("a/c/d/.keep", false),
                ("a/file.txt", false),
            ]
        );
    }

    #[tokio::test]
    async fn test_list_nested_directory_excludes_ancestors() {
        let (_, adapter) = adapter();
        let cancel = CancellationToken::new();
        write(&adapter, "a/b/c.txt").await;

        let entries = adapter.list_contents(&p("a/b/"), &cancel).await.unwrap();
        assert_eq!(entries, vec![p("a/b/"), p("a/b/c.txt")]);
    }

    #[tokio::test]
    async fn test_iterate_stops_paging() {
        let client = Arc::new(MemoryObjectClient::new().with_page_size(2));
        let adapter = ObjectStoreAdapter::new(client.clone());
        for i in 0..10 {
            write(&adapter, &format!("d/{i}")).await;
        }
        let before = client.list_calls();

        let mut seen = 0;
        adapter
            .iterate_contents(
                &p("d/"),
                &mut |_| {
                    seen += 1;
                    if seen == 2 {
                        ControlFlow::Break(())
                    } else {
                        ControlFlow::Continue(())
                    }
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(seen, 2);
        // one existence check plus the first page only
        assert_eq!(client.list_calls() - before, 2);
    }

    #[tokio::test]
    async fn test_create_directory_writes_marker() {
        let (client, adapter) = adapter();
        let cancel = CancellationToken::new();

        adapter.create_directory(&p("new/"), &cancel).await.unwrap();
        assert_eq!(client.keys(), vec!["new/.keep".to_string()]);
        assert!(adapter.directory_exists(&p("new/"), &cancel).await.unwrap());

        let err = adapter
            .create_directory(&p("new/"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_create_directory_over_file_fails() {
        let (_, adapter) = adapter();
        let cancel = CancellationToken::new();
        write(&adapter, "report").await;
        let err = adapter
            .create_directory(&p("report/"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_delete_directory_past_bulk_limit() {
        let (client, adapter) = adapter();
        let cancel = CancellationToken::new();
        for i in 0..1001 {
            client
                .put(&format!("big/{i:04}"), Vec::new(), "x")
                .await
                .unwrap();
        }
        client.put("keep/me", Vec::new(), "x").await.unwrap();

        adapter.delete_directory(&p("big/"), &cancel).await.unwrap();
        assert!(!adapter.directory_exists(&p("big/"), &cancel).await.unwrap());
        assert_eq!(client.keys(), vec!["keep/me".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_batches_within_one_page() {
        // One listing page larger than the bulk-delete limit must be split.
        let client = Arc::new(
            MemoryObjectClient::new()
                .with_page_size(5000)
                .with_bulk_delete_limit(1000),
        );
        let adapter = ObjectStoreAdapter::new(client.clone());
        for i in 0..1001 {
            client
                .put(&format!("big/{i:04}"), Vec::new(), "x")
                .await
                .unwrap();
        }

        adapter
            .delete_directory(&p("big/"), &CancellationToken::new())
            .await
            .unwrap();
        assert!(client.is_empty());
        assert_eq!(client.bulk_delete_calls(), 2);
    }

    #[tokio::test]
    async fn test_move_directory() {
        let client = Arc::new(MemoryObjectClient::new().with_page_size(3));
        let adapter = ObjectStoreAdapter::new(client.clone());
        let cancel = CancellationToken::new();
        for i in 0..7 {
            write(&adapter, &format!("src/{i}.txt")).await;
        }
        write(&adapter, "src/nested/src/x.txt").await;

        adapter
            .move_directory(&p("src/"), &p("dst/"), &cancel)
            .await
            .unwrap();

        assert!(!adapter.directory_exists(&p("src/"), &cancel).await.unwrap());
        // prefix replaced once, inner "src/" segment untouched
        assert!(
            adapter
                .file_exists(&p("dst/nested/src/x.txt"), &cancel)
                .await
                .unwrap()
        );
        assert_eq!(client.len(), 8);
    }

    #[tokio::test]
    async fn test_move_directory_batches_deletes() {
        let client = Arc::new(
            MemoryObjectClient::new()
                .with_page_size(4)
                .with_bulk_delete_limit(3),
        );
        let adapter = ObjectStoreAdapter::new(client.clone());
        let cancel = CancellationToken::new();
        for i in 0..10 {
            client
                .put(&format!("src/{i:02}"), Vec::new(), "x")
                .await
                .unwrap();
        }

        adapter
            .move_directory(&p("src/"), &p("dst/"), &cancel)
            .await
            .unwrap();

        let expected: Vec<String> = (0..10).map(|i| format!("dst/{i:02}")).collect();
        assert_eq!(client.keys(), expected);
        assert_eq!(client.bulk_delete_calls(), 4);
    }

    #[tokio::test]
    async fn test_failed_bulk_delete_is_reported() {
        let (client, adapter) = adapter();
        let cancel = CancellationToken::new();
        write(&adapter, "src/a").await;
        write(&adapter, "src/b/c").await;
        client.fail_on("delete_many");

        let err = adapter
            .delete_directory(&p("src/"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ProviderOperationFailed {
                operation: "delete_objects",
                ..
            }
        ));

        let err = adapter
            .move_directory(&p("src/"), &p("dst/"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ProviderOperationFailed { .. }), "{err}");
        assert!(adapter.directory_exists(&p("src/"), &cancel).await.unwrap());
    }

    #[tokio::test]
    async fn test_copy_directory_keeps_source() {
        let (client, adapter) = adapter();
        let cancel = CancellationToken::new();
        write(&adapter, "src/a").await;
        write(&adapter, "src/b/c").await;

        let info = adapter
            .copy_directory(&p("src/"), &p("copy/"), &cancel)
            .await
            .unwrap();
        assert_eq!(info.path, p("copy/"));
        assert_eq!(
            client.keys(),
            vec!["copy/a", "copy/b/c", "src/a", "src/b/c"]
        );

        let err = adapter
            .copy_directory(&p("src/"), &p("copy/"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_missing_subjects() {
        let (_, adapter) = adapter();
        let cancel = CancellationToken::new();
        let errors = [
            adapter.read_file(&p("x"), &cancel).await.unwrap_err(),
            adapter.delete_file(&p("x"), &cancel).await.unwrap_err(),
            adapter
                .copy_file(&p("x"), &p("y"), false, &cancel)
                .await
                .unwrap_err(),
            adapter
                .delete_directory(&p("d/"), &cancel)
                .await
                .unwrap_err(),
            adapter
                .list_contents(&p("d/"), &cancel)
                .await
                .unwrap_err(),
        ];
        for err in errors {
            assert!(matches!(err, Error::NotFound { .. }), "{err}");
        }
    }

    #[tokio::test]
    async fn test_touch_overwrites_existing() {
        let (_, adapter) = adapter();
        let cancel = CancellationToken::new();
        write(&adapter, "t").await;
        adapter.touch_file(&p("t"), &cancel).await.unwrap();
        let file = adapter.read_file(&p("t"), &cancel).await.unwrap();
        assert!(file.content.is_empty());
    }

    #[tokio::test]
    async fn test_provider_failure_is_wrapped() {
        let (client, adapter) = adapter();
        let cancel = CancellationToken::new();
        write(&adapter, "src/a").await;
        client.fail_on("copy");

        let err = adapter
            .copy_file(&p("src/a"), &p("dst/a"), false, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ProviderOperationFailed {
                operation: "copy_object",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_public_url_presigns() {
        let (_, adapter) = adapter();
        let cancel = CancellationToken::new();
        write(&adapter, "docs/a.pdf").await;
        let url = adapter
            .public_url(
                &p("docs/a.pdf"),
                Utc::now() + chrono::Duration::hours(1),
                &cancel,
            )
            .await
            .unwrap();
        assert!(url.starts_with("memory://bucket/docs/a.pdf?expires_in="));
    }
}
