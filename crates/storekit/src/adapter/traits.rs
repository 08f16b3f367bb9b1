//! Adapter trait definitions

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::path::StoragePath;

/// Content type used when a backend has no better answer.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Callback driven by [`StorageAdapter::iterate_contents`].
///
/// Return `ControlFlow::Break(())` to stop; no further pages are fetched.
pub type ContentVisitor<'a> = dyn FnMut(StoragePath) -> ControlFlow<()> + Send + 'a;

/// Async storage adapter trait.
///
/// Every backend implements the full capability set. Paths arrive already
/// combined with the store's root path, so adapters never deal with
/// root-path scoping.
///
/// # Errors
///
/// Adapter failures are exhaustively:
/// - [`Error::NotFound`](crate::Error::NotFound) when the subject is missing
/// - [`Error::AlreadyExists`](crate::Error::AlreadyExists) when a creation
///   target is present
/// - [`Error::ProviderOperationFailed`](crate::Error::ProviderOperationFailed)
///   for anything the backend did unexpectedly
///
/// plus [`Error::Cancelled`](crate::Error::Cancelled) once `cancel` fires.
///
/// # Directories
///
/// A directory exists when at least one entry has it in its path tree.
/// Listings include the listed directory itself, then every descendant;
/// directory entries carry a trailing slash.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Check if a file exists.
    async fn file_exists(&self, path: &StoragePath, cancel: &CancellationToken) -> Result<bool>;

    /// Get file metadata.
    async fn get_file(&self, path: &StoragePath, cancel: &CancellationToken) -> Result<FileInfo>;

    /// Create an empty file.
    ///
    /// Behavior on an existing file differs per backend: the object store
    /// and disk adapters overwrite it, the in-memory adapter fails with
    /// `AlreadyExists`.
    async fn touch_file(&self, path: &StoragePath, cancel: &CancellationToken)
    -> Result<FileInfo>;

    /// Read a file's contents.
    async fn read_file(&self, path: &StoragePath, cancel: &CancellationToken)
    -> Result<FileContent>;

    /// Write contents to a file, creating intermediate directories.
    ///
    /// Fails with `AlreadyExists` when the file exists and `overwrite` is
    /// false.
    async fn write_file(
        &self,
        path: &StoragePath,
        content: Vec<u8>,
        content_type: Option<&str>,
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> Result<FileInfo>;

    /// Copy a file. Returns the destination's metadata.
    async fn copy_file(
        &self,
        source: &StoragePath,
        destination: &StoragePath,
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> Result<FileInfo>;

    /// Move a file. Returns the destination's metadata.
    async fn move_file(
        &self,
        source: &StoragePath,
        destination: &StoragePath,
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> Result<FileInfo>;

    /// Delete a file.
    async fn delete_file(&self, path: &StoragePath, cancel: &CancellationToken) -> Result<()>;

    /// Check if a directory exists.
    async fn directory_exists(
        &self,
        path: &StoragePath,
        cancel: &CancellationToken,
    ) -> Result<bool>;

    /// Create a directory.
    ///
    /// Fails with `AlreadyExists` when the directory, or a file at the same
    /// location, already exists.
    async fn create_directory(
        &self,
        path: &StoragePath,
        cancel: &CancellationToken,
    ) -> Result<DirectoryInfo>;

    /// Delete a directory and everything beneath it.
    async fn delete_directory(&self, path: &StoragePath, cancel: &CancellationToken)
    -> Result<()>;

    /// Copy a directory tree. Fails with `AlreadyExists` if the destination
    /// exists.
    async fn copy_directory(
        &self,
        source: &StoragePath,
        destination: &StoragePath,
        cancel: &CancellationToken,
    ) -> Result<DirectoryInfo>;

    /// Move a directory tree. Fails with `AlreadyExists` if the destination
    /// exists.
    async fn move_directory(
        &self,
        source: &StoragePath,
        destination: &StoragePath,
        cancel: &CancellationToken,
    ) -> Result<DirectoryInfo>;

    /// List a directory and all of its descendants.
    async fn list_contents(
        &self,
        path: &StoragePath,
        cancel: &CancellationToken,
    ) -> Result<Vec<StoragePath>> {
        let mut entries = Vec::new();
        self.iterate_contents(
            path,
            &mut |entry| {
                entries.push(entry);
                ControlFlow::Continue(())
            },
            cancel,
        )
        .await?;
        Ok(entries)
    }

    /// Visit a directory and its descendants until the visitor breaks.
    async fn iterate_contents(
        &self,
        path: &StoragePath,
        visitor: &mut ContentVisitor<'_>,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Build a URL through which the file can be fetched until `expiry`.
    async fn public_url(
        &self,
        path: &StoragePath,
        expiry: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<String>;
}

/// File metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    /// File path
    pub path: StoragePath,
    /// Size in bytes
    pub size: u64,
    /// MIME type
    pub content_type: String,
    /// Last modification time, when the backend reports one
    pub last_modified: Option<DateTime<Utc>>,
}

impl FileInfo {
    /// Metadata for content just written.
    pub fn new(path: StoragePath, size: u64, content_type: impl Into<String>) -> Self {
        Self {
            path,
            size,
            content_type: content_type.into(),
            last_modified: Some(Utc::now()),
        }
    }
}

/// File metadata plus content.
#[derive(Debug, Clone, PartialEq)]
pub struct FileContent {
    /// Metadata
    pub info: FileInfo,
    /// Fresh copy of the stored bytes
    pub content: Vec<u8>,
}

/// Directory result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryInfo {
    /// Directory path
    pub path: StoragePath,
}

impl DirectoryInfo {
    pub fn new(path: StoragePath) -> Self {
        Self { path }
    }
}
