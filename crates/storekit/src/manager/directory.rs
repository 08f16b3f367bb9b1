//! Directory operations.

use std::ops::ControlFlow;
use std::sync::Arc;

use super::request::{DirectoryRequest, DirectoryTransferRequest};
use super::{Scope, require_directory, require_distinct};
use crate::adapter::DirectoryInfo;
use crate::error::{Error, Result};
use crate::path::StoragePath;
use crate::registry::StoreRegistry;

/// Caller-facing directory API.
#[derive(Clone)]
pub struct DirectoryManager {
    registry: Arc<StoreRegistry>,
}

impl DirectoryManager {
    pub fn new(registry: Arc<StoreRegistry>) -> Self {
        Self { registry }
    }

    fn transfer_checks(request: &DirectoryTransferRequest) -> Result<()> {
        require_directory(&request.source)?;
        require_directory(&request.destination)?;
        require_distinct(&request.source, &request.destination)?;
        if request.destination.is_within(&request.source) {
            return Err(Error::InvalidRequest(format!(
                "destination '{}' lies inside source '{}'",
                request.destination, request.source
            )));
        }
        Ok(())
    }

    /// Check whether a directory exists.
    pub async fn exists(&self, request: DirectoryRequest) -> Result<bool> {
        require_directory(&request.path)?;
        let scope = Scope::resolve(&self.registry, &request.store)?;
        let path = scope.apply(&request.path)?;
        tracing::debug!(store = %request.store, operation = "directory_exists", path = %request.path);
        scope
            .store()
            .adapter()
            .directory_exists(&path, &request.cancel)
            .await
            .map_err(|err| scope.wrap(err))
    }

    /// Create a directory.
    pub async fn create(&self, request: DirectoryRequest) -> Result<DirectoryInfo> {
        require_directory(&request.path)?;
        let scope = Scope::resolve(&self.registry, &request.store)?;
        let path = scope.apply(&request.path)?;
        tracing::debug!(store = %request.store, operation = "create_directory", path = %request.path);
        let info = scope
            .store()
            .adapter()
            .create_directory(&path, &request.cancel)
            .await
            .map_err(|err| scope.wrap(err))?;
        Ok(DirectoryInfo::new(scope.strip_or_root(&info.path)))
    }

    /// Delete a directory and everything beneath it.
    pub async fn delete(&self, request: DirectoryRequest) -> Result<()> {
        require_directory(&request.path)?;
        let scope = Scope::resolve(&self.registry, &request.store)?;
        let path = scope.apply(&request.path)?;
        tracing::debug!(store = %request.store, operation = "delete_directory", path = %request.path);
        scope
            .store()
            .adapter()
            .delete_directory(&path, &request.cancel)
            .await
            .map_err(|err| scope.wrap(err))
    }

    /// Copy a directory tree.
    pub async fn copy(&self, request: DirectoryTransferRequest) -> Result<DirectoryInfo> {
        Self::transfer_checks(&request)?;
        let scope = Scope::resolve(&self.registry, &request.store)?;
        let source = scope.apply(&request.source)?;
        let destination = scope.apply(&request.destination)?;
        tracing::debug!(
            store = %request.store,
            operation = "copy_directory",
            source = %request.source,
            destination = %request.destination
        );
        let info = scope
            .store()
            .adapter()
            .copy_directory(&source, &destination, &request.cancel)
            .await
            .map_err(|err| scope.wrap(err))?;
        Ok(DirectoryInfo::new(scope.strip_or_root(&info.path)))
    }

    /// Move a directory tree.
    pub async fn move_to(&self, request: DirectoryTransferRequest) -> Result<DirectoryInfo> {
        Self::transfer_checks(&request)?;
        let scope = Scope::resolve(&self.registry, &request.store)?;
        let source = scope.apply(&request.source)?;
        let destination = scope.apply(&request.destination)?;
        tracing::debug!(
            store = %request.store,
            operation = "move_directory",
            source = %request.source,
            destination = %request.destination
        );
        let info = scope
            .store()
            .adapter()
            .move_directory(&source, &destination, &request.cancel)
            .await
            .map_err(|err| scope.wrap(err))?;
        Ok(DirectoryInfo::new(scope.strip_or_root(&info.path)))
    }

    /// List a directory and all of its descendants.
    pub async fn list_contents(&self, request: DirectoryRequest) -> Result<Vec<StoragePath>> {
        require_directory(&request.path)?;
        let scope = Scope::resolve(&self.registry, &request.store)?;
        let path = scope.apply(&request.path)?;
        tracing::debug!(store = %request.store, operation = "list_contents", path = %request.path);
        let entries = scope
            .store()
            .adapter()
            .list_contents(&path, &request.cancel)
            .await
            .map_err(|err| scope.wrap(err))?;
        Ok(entries
            .iter()
            .filter_map(|entry| scope.strip(entry))
            .collect())
    }

    /// Visit a directory and its descendants until `visitor` breaks.
    ///
    /// Entries are root-stripped before the visitor sees them.
    pub async fn iterate_contents<F>(&self, request: DirectoryRequest, mut visitor: F) -> Result<()>
    where
        F: FnMut(StoragePath) -> ControlFlow<()> + Send,
    {
        require_directory(&request.path)?;
        let scope = Scope::resolve(&self.registry, &request.store)?;
        let path = scope.apply(&request.path)?;
        tracing::debug!(store = %request.store, operation = "iterate_contents", path = %request.path);
        let mut scoped = |entry: StoragePath| match scope.strip(&entry) {
            Some(entry) => visitor(entry),
            None => ControlFlow::Continue(()),
        };
        scope
            .store()
            .adapter()
            .iterate_contents(&path, &mut scoped, &request.cancel)
            .await
            .map_err(|err| scope.wrap(err))
    }
}
