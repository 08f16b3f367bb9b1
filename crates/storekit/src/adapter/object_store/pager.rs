//! Paged listing and bulk-mutation batching.
//!
//! [`ObjectPager`] yields listing pages one at a time and can be stopped
//! between pages. [`batches`] groups keys into provider-sized chunks. The two
//! are independent: callers decide what to do with each page.

use tokio_util::sync::CancellationToken;

use super::client::{ObjectClient, ObjectMeta};
use crate::adapter::cancellable;
use crate::error::{Error, Result};

/// Page-by-page walk over every key under a prefix.
pub(crate) struct ObjectPager<'a> {
    client: &'a dyn ObjectClient,
    prefix: String,
    token: Option<String>,
    finished: bool,
}

impl<'a> ObjectPager<'a> {
    pub(crate) fn new(client: &'a dyn ObjectClient, prefix: impl Into<String>) -> Self {
        Self {
            client,
            prefix: prefix.into(),
            token: None,
            finished: false,
        }
    }

    /// Fetch the next page, `None` once the listing is exhausted or stopped.
    pub(crate) async fn next_page(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<ObjectMeta>>> {
        if self.finished {
            return Ok(None);
        }
        let client = self.client;
        let token = self.token.take();
        let page = cancellable(cancel, async {
            client
                .list_page(&self.prefix, token, None)
                .await
                .map_err(Error::provider("list_objects"))
        })
        .await?;

        tracing::trace!(
            prefix = %self.prefix,
            objects = page.objects.len(),
            more = page.next_token.is_some(),
            "listed page"
        );

        self.token = page.next_token;
        self.finished = self.token.is_none();
        Ok(Some(page.objects))
    }

    /// Stop paging; the next call to `next_page` yields `None`.
    pub(crate) fn stop(&mut self) {
        self.finished = true;
    }
}

/// Split keys into chunks of at most `limit` (minimum one key per chunk).
pub(crate) fn batches(keys: &[String], limit: usize) -> impl Iterator<Item = &[String]> {
    keys.chunks(limit.max(1))
}
