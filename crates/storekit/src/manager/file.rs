//! File operations.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::request::{FileRequest, PublicUrlRequest, TransferRequest, WriteFileRequest};
use super::{Scope, require_distinct, require_file};
use crate::adapter::{FileContent, FileInfo};
use crate::error::{Error, Result};
use crate::registry::StoreRegistry;

/// Shortest lifetime a public URL may be requested for.
pub const MIN_PUBLIC_URL_LIFETIME: Duration = Duration::seconds(10);

/// Lifetime used when a request gives no expiry.
pub const DEFAULT_PUBLIC_URL_LIFETIME: Duration = Duration::days(1);

/// A time-limited URL to a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUrl {
    pub url: String,
    pub expiry: DateTime<Utc>,
}

/// Caller-facing file API.
#[derive(Clone)]
pub struct FileManager {
    registry: Arc<StoreRegistry>,
}

impl FileManager {
    pub fn new(registry: Arc<StoreRegistry>) -> Self {
        Self { registry }
    }

    fn strip_info(scope: &Scope, mut info: FileInfo) -> FileInfo {
        info.path = scope.strip_or_root(&info.path);
        info
    }

    /// Check whether a file exists.
    pub async fn exists(&self, request: FileRequest) -> Result<bool> {
        require_file(&request.path)?;
        let scope = Scope::resolve(&self.registry, &request.store)?;
        let path = scope.apply(&request.path)?;
        tracing::debug!(store = %request.store, operation = "file_exists", path = %request.path);
        scope
            .store()
            .adapter()
            .file_exists(&path, &request.cancel)
            .await
            .map_err(|err| scope.wrap(err))
    }

    /// Get file metadata.
    pub async fn get(&self, request: FileRequest) -> Result<FileInfo> {
        require_file(&request.path)?;
        let scope = Scope::resolve(&self.registry, &request.store)?;
        let path = scope.apply(&request.path)?;
        tracing::debug!(store = %request.store, operation = "get_file", path = %request.path);
        let info = scope
            .store()
            .adapter()
            .get_file(&path, &request.cancel)
            .await
            .map_err(|err| scope.wrap(err))?;
        Ok(Self::strip_info(&scope, info))
    }

    /// Create an empty file.
    ///
    /// What happens to an existing file depends on the backend; see
    /// [`StorageAdapter::touch_file`](crate::StorageAdapter::touch_file).
    pub async fn touch(&self, request: FileRequest) -> Result<FileInfo> {
        require_file(&request.path)?;
        let scope = Scope::resolve(&self.registry, &request.store)?;
        let path = scope.apply(&request.path)?;
        tracing::debug!(store = %request.store, operation = "touch_file", path = %request.path);
        let info = scope
            .store()
            .adapter()
            .touch_file(&path, &request.cancel)
            .await
            .map_err(|err| scope.wrap(err))?;
        Ok(Self::strip_info(&scope, info))
    }

    /// Read a file.
    pub async fn read(&self, request: FileRequest) -> Result<FileContent> {
        require_file(&request.path)?;
        let scope = Scope::resolve(&self.registry, &request.store)?;
        let path = scope.apply(&request.path)?;
        tracing::debug!(store = %request.store, operation = "read_file", path = %request.path);
        let mut content = scope
            .store()
            .adapter()
            .read_file(&path, &request.cancel)
            .await
            .map_err(|err| scope.wrap(err))?;
        content.info = Self::strip_info(&scope, content.info);
        Ok(content)
    }

    /// Write a buffer to a file.
    pub async fn write(&self, request: WriteFileRequest) -> Result<FileInfo> {
        require_file(&request.path)?;
        let scope = Scope::resolve(&self.registry, &request.store)?;
        let path = scope.apply(&request.path)?;
        tracing::debug!(
            store = %request.store,
            operation = "write_file",
            path = %request.path,
            size = request.content.len(),
            overwrite = request.overwrite
        );
        let info = scope
            .store()
            .adapter()
            .write_file(
                &path,
                request.content,
                request.content_type.as_deref(),
                request.overwrite,
                &request.cancel,
            )
            .await
            .map_err(|err| scope.wrap(err))?;
        Ok(Self::strip_info(&scope, info))
    }

    /// Buffer `reader` to its end, then write it in place of
    /// `request.content`.
    pub async fn write_from_reader<R>(
        &self,
        mut request: WriteFileRequest,
        reader: &mut R,
    ) -> Result<FileInfo>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        require_file(&request.path)?;
        let scope = Scope::resolve(&self.registry, &request.store)?;
        let mut buffer = Vec::new();
        reader
            .read_to_end(&mut buffer)
            .await
            .map_err(|err| scope.wrap(Error::Io(err)))?;
        request.content = buffer;
        self.write(request).await
    }

    /// Copy a file.
    pub async fn copy(&self, request: TransferRequest) -> Result<FileInfo> {
        require_file(&request.source)?;
        require_file(&request.destination)?;
        require_distinct(&request.source, &request.destination)?;
        let scope = Scope::resolve(&self.registry, &request.store)?;
        let source = scope.apply(&request.source)?;
        let destination = scope.apply(&request.destination)?;
        tracing::debug!(
            store = %request.store,
            operation = "copy_file",
            source = %request.source,
            destination = %request.destination
        );
        let info = scope
            .store()
            .adapter()
            .copy_file(&source, &destination, request.overwrite, &request.cancel)
            .await
            .map_err(|err| scope.wrap(err))?;
        Ok(Self::strip_info(&scope, info))
    }

    /// Move a file.
    pub async fn move_to(&self, request: TransferRequest) -> Result<FileInfo> {
        require_file(&request.source)?;
        require_file(&request.destination)?;
        require_distinct(&request.source, &request.destination)?;
        let scope = Scope::resolve(&self.registry, &request.store)?;
        let source = scope.apply(&request.source)?;
        let destination = scope.apply(&request.destination)?;
        tracing::debug!(
            store = %request.store,
            operation = "move_file",
            source = %request.source,
            destination = %request.destination
        );
        let info = scope
            .store()
            .adapter()
            .move_file(&source, &destination, request.overwrite, &request.cancel)
            .await
            .map_err(|err| scope.wrap(err))?;
        Ok(Self::strip_info(&scope, info))
    }

    /// Delete a file.
    pub async fn delete(&self, request: FileRequest) -> Result<()> {
        require_file(&request.path)?;
        let scope = Scope::resolve(&self.registry, &request.store)?;
        let path = scope.apply(&request.path)?;
        tracing::debug!(store = %request.store, operation = "delete_file", path = %request.path);
        scope
            .store()
            .adapter()
            .delete_file(&path, &request.cancel)
            .await
            .map_err(|err| scope.wrap(err))
    }

    /// Get a URL through which the file can be fetched until the expiry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] when the expiry is less than ten
    /// seconds away.
    pub async fn public_url(&self, request: PublicUrlRequest) -> Result<PublicUrl> {
        require_file(&request.path)?;
        let now = Utc::now();
        let expiry = request
            .expiry
            .unwrap_or_else(|| now + DEFAULT_PUBLIC_URL_LIFETIME);
        if expiry < now + MIN_PUBLIC_URL_LIFETIME {
            return Err(Error::InvalidRequest(format!(
                "public url expiry {expiry} must be at least {} seconds in the future",
                MIN_PUBLIC_URL_LIFETIME.num_seconds()
            )));
        }
        let scope = Scope::resolve(&self.registry, &request.store)?;
        let path = scope.apply(&request.path)?;
        tracing::debug!(store = %request.store, operation = "public_url", path = %request.path, %expiry);
        let url = scope
            .store()
            .adapter()
            .public_url(&path, expiry, &request.cancel)
            .await
            .map_err(|err| scope.wrap(err))?;
        Ok(PublicUrl { url, expiry })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::adapter::{MemoryAdapter, StorageAdapter};
    use crate::path::StoragePath;
    use tokio_util::sync::CancellationToken;

    fn p(raw: &str) -> StoragePath {
        StoragePath::parse(raw).unwrap()
    }

    fn manager(root: Option<&str>) -> (Arc<MemoryAdapter>, FileManager) {
        let adapter = Arc::new(MemoryAdapter::new());
        let mut registry = StoreRegistry::new();
        registry
            .register("default", adapter.clone() as Arc<dyn StorageAdapter>, root.map(p))
            .unwrap();
        (adapter, FileManager::new(Arc::new(registry)))
    }

    #[tokio::test]
    async fn test_write_lands_under_root_path() {
        let (adapter, files) = manager(Some("tenant/"));
        let info = files
            .write(WriteFileRequest::new(p("docs/a.txt"), "hello"))
            .await
            .unwrap();
        assert_eq!(info.path, p("docs/a.txt"));

        let cancel = CancellationToken::new();
        assert!(
            adapter
                .file_exists(&p("tenant/docs/a.txt"), &cancel)
                .await
                .unwrap()
        );

        let content = files.read(FileRequest::new(p("docs/a.txt"))).await.unwrap();
        assert_eq!(content.content, b"hello");
        assert_eq!(content.info.path, p("docs/a.txt"));
    }

    #[tokio::test]
    async fn test_directory_path_rejected() {
        let (_, files) = manager(None);
        let err = files.read(FileRequest::new(p("docs/"))).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_unknown_store_before_dispatch() {
        let (_, files) = manager(None);
        let err = files
            .exists(FileRequest::new(p("a.txt")).store("archive"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StoreNotFound(name) if name == "archive"));
    }

    #[tokio::test]
    async fn test_not_found_path_is_caller_relative() {
        let (_, files) = manager(Some("tenant/"));
        let err = files
            .delete(FileRequest::new(p("gone.txt")))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "not found: gone.txt");
    }

    #[tokio::test]
    async fn test_copy_and_move() {
        let (_, files) = manager(Some("tenant/"));
        files
            .write(WriteFileRequest::new(p("a.txt"), "x"))
            .await
            .unwrap();

        let copied = files
            .copy(TransferRequest::new(p("a.txt"), p("b.txt")))
            .await
            .unwrap();
        assert_eq!(copied.path, p("b.txt"));

        let err = files
            .move_to(TransferRequest::new(p("a.txt"), p("b.txt")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { path } if path == p("b.txt")));

        files
            .move_to(TransferRequest::new(p("a.txt"), p("b.txt")).overwrite(true))
            .await
            .unwrap();
        assert!(!files.exists(FileRequest::new(p("a.txt"))).await.unwrap());

        let err = files
            .copy(TransferRequest::new(p("b.txt"), p("/b.txt")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_write_from_reader() {
        let (_, files) = manager(None);
        let mut reader: &[u8] = b"streamed bytes";
        let info = files
            .write_from_reader(WriteFileRequest::new(p("s.bin"), Vec::new()), &mut reader)
            .await
            .unwrap();
        assert_eq!(info.size, 14);
    }

    #[tokio::test]
    async fn test_public_url_expiry() {
        let (_, files) = manager(Some("tenant/"));
        files
            .write(WriteFileRequest::new(p("a.txt"), "x"))
            .await
            .unwrap();

        let err = files
            .public_url(PublicUrlRequest::new(p("a.txt")).expiry(Utc::now() + Duration::seconds(5)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));

        let before = Utc::now();
        let url = files
            .public_url(PublicUrlRequest::new(p("a.txt")))
            .await
            .unwrap();
        assert_eq!(url.url, "memory:///tenant/a.txt");
        assert!(url.expiry >= before + Duration::hours(23));
    }

    #[tokio::test]
    async fn test_cancelled_request() {
        let (_, files) = manager(None);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = files
            .touch(FileRequest::new(p("a.txt")).cancel(cancel))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
