//! Error types for Storekit
//!
//! This module provides error types for the storage layer with the following design goals:
//! - Paths embedded in messages are the caller-relative ones (root path stripped)
//! - Domain kinds (`NotFound`, `AlreadyExists`, validation) are never re-wrapped
//! - Unexpected backend failures are wrapped exactly once, with the cause preserved

use std::error::Error as StdError;
use thiserror::Error;

use crate::path::StoragePath;

/// Result type alias using Storekit's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error produced by backend clients.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Storekit error types.
#[derive(Error, Debug)]
pub enum Error {
    /// The raw path could not be turned into a [`StoragePath`].
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// The request was structurally wrong (path shape, expiry, overlap).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The subject of an operation does not exist.
    #[error("not found: {path}")]
    NotFound { path: StoragePath },

    /// The target of a creation-style operation already exists.
    #[error("already exists: {path}")]
    AlreadyExists { path: StoragePath },

    /// No store is registered under this name.
    #[error("store not found: {0}")]
    StoreNotFound(String),

    /// A store with this name (case-insensitive) is already registered.
    #[error("store already registered: {0}")]
    StoreAlreadyRegistered(String),

    /// A backend call failed unexpectedly.
    #[error("provider operation '{operation}' failed: {source}")]
    ProviderOperationFailed {
        operation: &'static str,
        #[source]
        source: BoxError,
    },

    /// The operation's cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    /// I/O error surfaced by a custom adapter.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),

    /// Manager-level wrapper for failures outside the taxonomy above.
    #[error("operation on store '{store}' failed: {source}")]
    StoreOperationFailed {
        store: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a validation error for a raw path.
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a not-found error.
    pub fn not_found(path: &StoragePath) -> Self {
        Self::NotFound { path: path.clone() }
    }

    /// Create an already-exists error.
    pub fn already_exists(path: &StoragePath) -> Self {
        Self::AlreadyExists { path: path.clone() }
    }

    /// Wrap a backend failure. Returns a closure so it slots into `map_err`.
    pub fn provider<E>(operation: &'static str) -> impl FnOnce(E) -> Self
    where
        E: Into<BoxError>,
    {
        move |err| Self::ProviderOperationFailed {
            operation,
            source: err.into(),
        }
    }

    /// Whether this kind belongs to the storage taxonomy and must cross
    /// manager boundaries unchanged.
    pub fn is_domain(&self) -> bool {
        !matches!(self, Self::Io(_) | Self::Config(_))
    }

    /// Path embedded in a `NotFound` / `AlreadyExists` error.
    pub fn path(&self) -> Option<&StoragePath> {
        match self {
            Self::NotFound { path } | Self::AlreadyExists { path } => Some(path),
            _ => None,
        }
    }
}
