//! File and directory managers.
//!
//! Managers are the caller-facing API. Each operation runs the same
//! pipeline:
//!
//! 1. validate the request (path shape, expiry, overlap)
//! 2. resolve the named store
//! 3. place request paths beneath the store's root path
//! 4. dispatch to the adapter
//! 5. strip the root path from results, or normalize the failure
//!
//! A caller of a root-scoped store never sees the root path, neither in
//! results nor in error messages.

mod directory;
mod file;
mod request;

pub use directory::DirectoryManager;
pub use file::{FileManager, PublicUrl};
pub use request::{
    DirectoryRequest, DirectoryTransferRequest, FileRequest, PublicUrlRequest, TransferRequest,
    WriteFileRequest,
};

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::path::StoragePath;
use crate::registry::{Store, StoreRegistry};

/// A resolved store plus the root-path bookkeeping for one request.
pub(crate) struct Scope {
    store: Arc<Store>,
}

impl Scope {
    pub(crate) fn resolve(registry: &StoreRegistry, name: &str) -> Result<Self> {
        Ok(Self {
            store: registry.get(name)?,
        })
    }

    pub(crate) fn store(&self) -> &Store {
        &self.store
    }

    /// Caller path to adapter path.
    pub(crate) fn apply(&self, path: &StoragePath) -> Result<StoragePath> {
        match self.store.root_path() {
            Some(root) => root.combine(path),
            None => Ok(path.clone()),
        }
    }

    /// Adapter path to caller path; `None` for the root and its ancestors.
    pub(crate) fn strip(&self, path: &StoragePath) -> Option<StoragePath> {
        match self.store.root_path() {
            Some(root) => path.remove_root_path(root),
            None => Some(path.clone()),
        }
    }

    /// Like [`strip`](Self::strip), mapping the root itself to `/`.
    pub(crate) fn strip_or_root(&self, path: &StoragePath) -> StoragePath {
        self.strip(path).unwrap_or_else(StoragePath::root)
    }

    /// Normalize an adapter failure for the caller.
    ///
    /// Paths in `NotFound` / `AlreadyExists` are root-stripped, other
    /// storage kinds pass through, anything else is wrapped once.
    pub(crate) fn wrap(&self, err: Error) -> Error {
        match err {
            Error::NotFound { path } => Error::NotFound {
                path: self.strip_or_root(&path),
            },
            Error::AlreadyExists { path } => Error::AlreadyExists {
                path: self.strip_or_root(&path),
            },
            err if err.is_domain() => err,
            err => {
                tracing::debug!(store = %self.store.name(), error = %err, "wrapping store failure");
                Error::StoreOperationFailed {
                    store: self.store.name().to_string(),
                    source: Box::new(err),
                }
            }
        }
    }
}

pub(crate) fn require_file(path: &StoragePath) -> Result<()> {
    if path.is_directory() {
        return Err(Error::InvalidRequest(format!(
            "expected a file path, got directory path '{path}'"
        )));
    }
    Ok(())
}

pub(crate) fn require_directory(path: &StoragePath) -> Result<()> {
    if !path.is_directory() {
        return Err(Error::InvalidRequest(format!(
            "expected a directory path, got file path '{path}'"
        )));
    }
    Ok(())
}

pub(crate) fn require_distinct(source: &StoragePath, destination: &StoragePath) -> Result<()> {
    if source == destination {
        return Err(Error::InvalidRequest(format!(
            "source and destination are both '{source}'"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::adapter::{MemoryAdapter, StorageAdapter};

    fn p(raw: &str) -> StoragePath {
        StoragePath::parse(raw).unwrap()
    }

    fn scoped(root: Option<&str>) -> Scope {
        let mut registry = StoreRegistry::new();
        let adapter: Arc<dyn StorageAdapter> = Arc::new(MemoryAdapter::new());
        registry
            .register("default", adapter, root.map(p))
            .unwrap();
        Scope::resolve(&registry, "default").unwrap()
    }

    #[test]
    fn apply_and_strip_are_inverse() {
        let scope = scoped(Some("tenant/1/"));
        let adapter_path = scope.apply(&p("docs/a.txt")).unwrap();
        assert_eq!(adapter_path.normalized(), "tenant/1/docs/a.txt");
        assert_eq!(scope.strip(&adapter_path).unwrap(), p("docs/a.txt"));
        assert!(scope.strip(&p("tenant/")).is_none());
        assert!(scope.strip(&p("tenant/1/")).is_none());
    }

    #[test]
    fn unscoped_store_is_identity() {
        let scope = scoped(None);
        assert_eq!(scope.apply(&p("a/b")).unwrap(), p("a/b"));
        assert_eq!(scope.strip(&p("a/b")).unwrap(), p("a/b"));
    }

    #[test]
    fn wrap_strips_error_paths() {
        let scope = scoped(Some("tenant/"));
        let err = scope.wrap(Error::not_found(&p("tenant/missing.txt")));
        assert!(matches!(&err, Error::NotFound { path } if path.normalized() == "missing.txt"));
        assert!(!err.to_string().contains("tenant"));

        let err = scope.wrap(Error::already_exists(&p("tenant/")));
        assert!(matches!(&err, Error::AlreadyExists { path } if path.is_root()));
    }

    #[test]
    fn wrap_passes_domain_kinds_and_wraps_the_rest() {
        let scope = scoped(None);
        let err = scope.wrap(Error::provider("put_object")(std::io::Error::other("x")));
        assert!(matches!(err, Error::ProviderOperationFailed { .. }));

        let err = scope.wrap(Error::Io(std::io::Error::other("disk gone")));
        match err {
            Error::StoreOperationFailed { store, source } => {
                assert_eq!(store, "default");
                assert!(matches!(*source, Error::Io(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn validation_helpers() {
        assert!(require_file(&p("a.txt")).is_ok());
        assert!(matches!(
            require_file(&p("a/")),
            Err(Error::InvalidRequest(_))
        ));
        assert!(require_directory(&p("a/")).is_ok());
        assert!(require_directory(&p("a")).is_err());
        assert!(require_distinct(&p("a/"), &p("/a//")).is_err());
    }
}
