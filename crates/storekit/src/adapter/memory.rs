//! In-memory adapter implementation
//!
//! Files live in a tree of [`DirectoryNode`]s owned by the adapter. One
//! mutex guards the whole tree and is held for the full duration of every
//! public operation, so the adapter behaves as a single-writer store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::ops::ControlFlow;
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use super::traits::{
    ContentVisitor, DEFAULT_CONTENT_TYPE, DirectoryInfo, FileContent, FileInfo, StorageAdapter,
};
use super::{cancellable, ensure_active};
use crate::error::{Error, Result};
use crate::path::StoragePath;

/// In-memory storage adapter.
///
/// Directories are real tree nodes created lazily on first write beneath
/// them. Copying a directory deep-clones the subtree; moving one re-parents
/// the same node.
pub struct MemoryAdapter {
    root: Mutex<DirectoryNode>,
}

#[derive(Debug, Clone, Default)]
struct DirectoryNode {
    directories: BTreeMap<String, DirectoryNode>,
    files: BTreeMap<StoragePath, FileRecord>,
}

#[derive(Debug, Clone)]
struct FileRecord {
    content_type: String,
    content: Vec<u8>,
    last_modified: DateTime<Utc>,
}

impl FileRecord {
    fn new(content: Vec<u8>, content_type: &str) -> Self {
        Self {
            content_type: content_type.to_string(),
            content,
            last_modified: Utc::now(),
        }
    }

    fn info(&self, path: &StoragePath) -> FileInfo {
        FileInfo {
            path: path.clone(),
            size: self.content.len() as u64,
            content_type: self.content_type.clone(),
            last_modified: Some(self.last_modified),
        }
    }
}

impl DirectoryNode {
    fn directory(&self, path: &StoragePath) -> Option<&DirectoryNode> {
        let mut node = self;
        for name in path.segments() {
            node = node.directories.get(name)?;
        }
        Some(node)
    }

    fn directory_mut(&mut self, path: &StoragePath) -> Option<&mut DirectoryNode> {
        let mut node = self;
        for name in path.segments() {
            node = node.directories.get_mut(name)?;
        }
        Some(node)
    }

    fn get_or_create_directory(&mut self, path: &StoragePath) -> &mut DirectoryNode {
        let mut node = self;
        for name in path.segments() {
            node = node.directories.entry(name.to_string()).or_default();
        }
        node
    }

    fn get_or_create_parent_directory_of(&mut self, path: &StoragePath) -> &mut DirectoryNode {
        match path.parent() {
            Some(parent) => self.get_or_create_directory(&parent),
            None => self,
        }
    }

    fn file(&self, path: &StoragePath) -> Option<&FileRecord> {
        self.directory(&path.parent()?)?.files.get(path)
    }

    fn remove_file(&mut self, path: &StoragePath) -> Option<FileRecord> {
        self.directory_mut(&path.parent()?)?.files.remove(path)
    }

    fn detach_directory(&mut self, path: &StoragePath) -> Option<DirectoryNode> {
        let name = path.name()?;
        self.directory_mut(&path.parent()?)?.directories.remove(name)
    }

    fn attach_directory(&mut self, path: &StoragePath, node: DirectoryNode) {
        if let Some(name) = path.name() {
            self.get_or_create_parent_directory_of(path)
                .directories
                .insert(name.to_string(), node);
        }
    }

    /// Re-key every file in this subtree from `from` to `to`.
    fn rewrite_paths(&mut self, from: &StoragePath, to: &StoragePath) {
        self.files = std::mem::take(&mut self.files)
            .into_iter()
            .filter_map(|(path, record)| {
                path.replace_directory_within_path(from, to)
                    .map(|path| (path, record))
            })
            .collect();
        for child in self.directories.values_mut() {
            child.rewrite_paths(from, to);
        }
    }

    /// Depth-first walk: the directory, its files, then each subdirectory.
    fn visit(&self, path: &StoragePath, visitor: &mut ContentVisitor<'_>) -> ControlFlow<()> {
        if !path.is_root() {
            visitor(path.clone())?;
        }
        for file in self.files.keys() {
            visitor(file.clone())?;
        }
        for (name, child) in &self.directories {
            child.visit(&path.child_directory(name), visitor)?;
        }
        ControlFlow::Continue(())
    }
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAdapter {
    /// Create an empty in-memory adapter.
    pub fn new() -> Self {
        Self {
            root: Mutex::new(DirectoryNode::default()),
        }
    }

    async fn lock(&self, cancel: &CancellationToken) -> Result<MutexGuard<'_, DirectoryNode>> {
        ensure_active(cancel)?;
        cancellable(cancel, async { Ok(self.root.lock().await) }).await
    }

    fn transfer_checks(
        root: &DirectoryNode,
        source: &StoragePath,
        destination: &StoragePath,
        overwrite: bool,
    ) -> Result<FileRecord> {
        let record = root
            .file(source)
            .cloned()
            .ok_or_else(|| Error::not_found(source))?;
        if !overwrite && root.file(destination).is_some() {
            return Err(Error::already_exists(destination));
        }
        Ok(record)
    }

    fn occupied(root: &DirectoryNode, path: &StoragePath) -> bool {
        root.directory(path).is_some()
            || path
                .as_file()
                .is_some_and(|file| root.file(&file).is_some())
    }
}

#[async_trait]
impl StorageAdapter for MemoryAdapter {
    async fn file_exists(&self, path: &StoragePath, cancel: &CancellationToken) -> Result<bool> {
        let root = self.lock(cancel).await?;
        Ok(root.file(path).is_some())
    }

    async fn get_file(&self, path: &StoragePath, cancel: &CancellationToken) -> Result<FileInfo> {
        let root = self.lock(cancel).await?;
        root.file(path)
            .map(|record| record.info(path))
            .ok_or_else(|| Error::not_found(path))
    }

    async fn touch_file(
        &self,
        path: &StoragePath,
        cancel: &CancellationToken,
    ) -> Result<FileInfo> {
        let mut root = self.lock(cancel).await?;
        if root.file(path).is_some() {
            return Err(Error::already_exists(path));
        }
        let record = FileRecord::new(Vec::new(), DEFAULT_CONTENT_TYPE);
        let info = record.info(path);
        root.get_or_create_parent_directory_of(path)
            .files
            .insert(path.clone(), record);
        Ok(info)
    }

    async fn read_file(
        &self,
        path: &StoragePath,
        cancel: &CancellationToken,
    ) -> Result<FileContent> {
        let root = self.lock(cancel).await?;
        let record = root.file(path).ok_or_else(|| Error::not_found(path))?;
        Ok(FileContent {
            info: record.info(path),
            content: record.content.clone(),
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
        let mut root = self.lock(cancel).await?;
        if !overwrite && root.file(path).is_some() {
            return Err(Error::already_exists(path));
        }
        let record = FileRecord::new(content, content_type.unwrap_or(DEFAULT_CONTENT_TYPE));
        let info = record.info(path);
        root.get_or_create_parent_directory_of(path)
            .files
            .insert(path.clone(), record);
        Ok(info)
    }

    async fn copy_file(
        &self,
        source: &StoragePath,
        destination: &StoragePath,
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> Result<FileInfo> {
        let mut root = self.lock(cancel).await?;
        let mut record = Self::transfer_checks(&root, source, destination, overwrite)?;
        record.last_modified = Utc::now();
        let info = record.info(destination);
        root.get_or_create_parent_directory_of(destination)
            .files
            .insert(destination.clone(), record);
        Ok(info)
    }

    async fn move_file(
        &self,
        source: &StoragePath,
        destination: &StoragePath,
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> Result<FileInfo> {
        let mut root = self.lock(cancel).await?;
        Self::transfer_checks(&root, source, destination, overwrite)?;
        let record = root
            .remove_file(source)
            .ok_or_else(|| Error::not_found(source))?;
        let info = record.info(destination);
        root.get_or_create_parent_directory_of(destination)
            .files
            .insert(destination.clone(), record);
        Ok(info)
    }

    async fn delete_file(&self, path: &StoragePath, cancel: &CancellationToken) -> Result<()> {
        let mut root = self.lock(cancel).await?;
        root.remove_file(path)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(path))
    }

    async fn directory_exists(
        &self,
        path: &StoragePath,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let root = self.lock(cancel).await?;
        Ok(root.directory(path).is_some())
    }

    async fn create_directory(
        &self,
        path: &StoragePath,
        cancel: &CancellationToken,
    ) -> Result<DirectoryInfo> {
        let mut root = self.lock(cancel).await?;
        if Self::occupied(&root, path) {
            return Err(Error::already_exists(path));
        }
        root.get_or_create_directory(path);
        Ok(DirectoryInfo::new(path.clone()))
    }

    async fn delete_directory(
        &self,
        path: &StoragePath,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut root = self.lock(cancel).await?;
        if path.is_root() {
            *root = DirectoryNode::default();
            return Ok(());
        }
        root.detach_directory(path)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(path))
    }

    async fn copy_directory(
        &self,
        source: &StoragePath,
        destination: &StoragePath,
        cancel: &CancellationToken,
    ) -> Result<DirectoryInfo> {
        let mut root = self.lock(cancel).await?;
        // Deep clone: the copy shares no node or buffer with the source.
        let mut subtree = root
            .directory(source)
            .cloned()
            .ok_or_else(|| Error::not_found(source))?;
        if Self::occupied(&root, destination) {
            return Err(Error::already_exists(destination));
        }
        subtree.rewrite_paths(source, destination);
        root.attach_directory(destination, subtree);
        Ok(DirectoryInfo::new(destination.clone()))
    }

    async fn move_directory(
        &self,
        source: &StoragePath,
        destination: &StoragePath,
        cancel: &CancellationToken,
    ) -> Result<DirectoryInfo> {
        let mut root = self.lock(cancel).await?;
        if root.directory(source).is_none() {
            return Err(Error::not_found(source));
        }
        if Self::occupied(&root, destination) {
            return Err(Error::already_exists(destination));
        }
        // Re-parent the same node; no clone needed since the source goes away.
        let mut subtree = root
            .detach_directory(source)
            .ok_or_else(|| Error::InvalidRequest("cannot move the root directory".into()))?;
        subtree.rewrite_paths(source, destination);
        root.attach_directory(destination, subtree);
        Ok(DirectoryInfo::new(destination.clone()))
    }

    async fn iterate_contents(
        &self,
        path: &StoragePath,
        visitor: &mut ContentVisitor<'_>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let root = self.lock(cancel).await?;
        let node = root.directory(path).ok_or_else(|| Error::not_found(path))?;
        let _ = node.visit(path, visitor);
        Ok(())
    }

    async fn public_url(
        &self,
        path: &StoragePath,
        _expiry: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let root = self.lock(cancel).await?;
        if root.file(path).is_none() {
            return Err(Error::not_found(path));
        }
        let url = url::Url::parse(&format!("memory:///{}", path.normalized()))
            .map_err(Error::provider("public_url"))?;
        Ok(url.to_string())
    }
}
