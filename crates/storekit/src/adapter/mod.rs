//! Storage adapters
//!
//! Provides the async adapter trait and implementations:
//! - `MemoryAdapter`: Tree-structured in-process store
//! - `DiskAdapter`: Local directory pass-through
//! - `ObjectStoreAdapter`: Directory emulation over a flat object store

mod disk;
mod memory;
pub mod object_store;
mod traits;

pub use disk::DiskAdapter;
pub use memory::MemoryAdapter;
pub use object_store::ObjectStoreAdapter;
pub use traits::{
    ContentVisitor, DEFAULT_CONTENT_TYPE, DirectoryInfo, FileContent, FileInfo, StorageAdapter,
};

use std::future::Future;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Fail fast if the token already fired.
pub(crate) fn ensure_active(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    Ok(())
}

/// Race a backend call against the cancellation token.
///
/// The call is dropped as soon as the token fires. Work it already did is
/// not undone.
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancellable_passes_result_through() {
        let cancel = CancellationToken::new();
        let value = cancellable(&cancel, async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn cancellable_aborts_pending_call() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: Result<()> = cancellable(&cancel, std::future::pending()).await;
        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(matches!(ensure_active(&cancel), Err(Error::Cancelled)));
    }
}
