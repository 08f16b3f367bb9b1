//! Request types for the managers.
//!
//! Every request names a store (default [`DEFAULT_STORE`]) and carries a
//! cancellation token. Paths are caller-relative: the store's root path is
//! applied by the manager.

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::path::StoragePath;
use crate::registry::DEFAULT_STORE;

/// Shared `store` / `cancel` setters.
macro_rules! request_options {
    ($($request:ident),+ $(,)?) => {
        $(
            impl $request {
                /// Target a named store instead of the default one.
                pub fn store(mut self, store: impl Into<String>) -> Self {
                    self.store = store.into();
                    self
                }

                /// Attach a cancellation token.
                pub fn cancel(mut self, cancel: CancellationToken) -> Self {
                    self.cancel = cancel;
                    self
                }
            }
        )+
    };
}

/// Single-file request: exists, get, touch, read, delete.
#[derive(Debug, Clone)]
pub struct FileRequest {
    pub store: String,
    pub path: StoragePath,
    pub cancel: CancellationToken,
}

impl FileRequest {
    pub fn new(path: StoragePath) -> Self {
        Self {
            store: DEFAULT_STORE.to_string(),
            path,
            cancel: CancellationToken::new(),
        }
    }
}

/// Write a buffer to a file.
#[derive(Debug, Clone)]
pub struct WriteFileRequest {
    pub store: String,
    pub path: StoragePath,
    pub content: Vec<u8>,
    /// Stored content type; backends fall back to
    /// [`DEFAULT_CONTENT_TYPE`](crate::DEFAULT_CONTENT_TYPE).
    pub content_type: Option<String>,
    /// Replace an existing file instead of failing with `AlreadyExists`.
    pub overwrite: bool,
    pub cancel: CancellationToken,
}

impl WriteFileRequest {
    pub fn new(path: StoragePath, content: impl Into<Vec<u8>>) -> Self {
        Self {
            store: DEFAULT_STORE.to_string(),
            path,
            content: content.into(),
            content_type: None,
            overwrite: false,
            cancel: CancellationToken::new(),
        }
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

/// Copy or move one file.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub store: String,
    pub source: StoragePath,
    pub destination: StoragePath,
    pub overwrite: bool,
    pub cancel: CancellationToken,
}

impl TransferRequest {
    pub fn new(source: StoragePath, destination: StoragePath) -> Self {
        Self {
            store: DEFAULT_STORE.to_string(),
            source,
            destination,
            overwrite: false,
            cancel: CancellationToken::new(),
        }
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

/// Single-directory request: exists, create, delete, list, iterate.
#[derive(Debug, Clone)]
pub struct DirectoryRequest {
    pub store: String,
    pub path: StoragePath,
    pub cancel: CancellationToken,
}

impl DirectoryRequest {
    pub fn new(path: StoragePath) -> Self {
        Self {
            store: DEFAULT_STORE.to_string(),
            path,
            cancel: CancellationToken::new(),
        }
    }
}

/// Copy or move a directory tree.
#[derive(Debug, Clone)]
pub struct DirectoryTransferRequest {
    pub store: String,
    pub source: StoragePath,
    pub destination: StoragePath,
    pub cancel: CancellationToken,
}

impl DirectoryTransferRequest {
    pub fn new(source: StoragePath, destination: StoragePath) -> Self {
        Self {
            store: DEFAULT_STORE.to_string(),
            source,
            destination,
            cancel: CancellationToken::new(),
        }
    }
}

/// Ask for a time-limited URL to a file.
#[derive(Debug, Clone)]
pub struct PublicUrlRequest {
    pub store: String,
    pub path: StoragePath,
    /// Defaults to one day from the time of the call.
    pub expiry: Option<DateTime<Utc>>,
    pub cancel: CancellationToken,
}

impl PublicUrlRequest {
    pub fn new(path: StoragePath) -> Self {
        Self {
            store: DEFAULT_STORE.to_string(),
            path,
            expiry: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn expiry(mut self, expiry: DateTime<Utc>) -> Self {
        self.expiry = Some(expiry);
        self
    }
}

request_options!(
    FileRequest,
    WriteFileRequest,
    TransferRequest,
    DirectoryRequest,
    DirectoryTransferRequest,
    PublicUrlRequest,
);
