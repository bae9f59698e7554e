//! History fetcher: walks a channel's message history backwards, one page file per batch.
//!
//! The walk is an explicit loop carrying a single cursor. Every request asks
//! for messages strictly older than the last message of the previous page,
//! so the page files written form a gap-free, strictly decreasing sequence.
//! The loop ends on the first empty page; the total size of the history is
//! never known in advance.
//!
//! Any failure aborts the walk. Nothing is lost by this: pages already
//! written stay on disk and their file names expose the cursor to resume from
//! (see [`RecordStore::frontier`]).

use crate::error::{Error, Result};
use crate::remote::MessageSource;
use crate::store::RecordStore;
use crate::types::{FetchReport, MessageId};
use tracing::{debug, info};

/// Sequential paginator over one channel
pub struct HistoryFetcher<S> {
    source: S,
    store: RecordStore,
    page_size: u32,
}

impl<S: MessageSource> HistoryFetcher<S> {
    /// Create a fetcher writing pages of `page_size` messages into `store`
    pub fn new(source: S, store: RecordStore, page_size: u32) -> Self {
        Self {
            source,
            store,
            page_size,
        }
    }

    /// The underlying message source
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fetch every message older than `start` (or the whole history when `None`)
    ///
    /// # Errors
    ///
    /// Transport failures, undecodable responses, a page that does not move
    /// the cursor backwards and page-write failures all abort the walk.
    pub async fn run(&self, start: Option<MessageId>) -> Result<FetchReport> {
        let raw_dir = self.store.ensure_raw_dir().await?;
        info!(
            channel = self.store.channel(),
            start = start.as_ref().map(MessageId::as_str),
            dir = %raw_dir.display(),
            "Fetching channel history"
        );

        let mut report = FetchReport::default();
        let mut cursor = start;
        let mut done = false;

        while !done {
            let raw = self
                .source
                .fetch_page(cursor.as_ref(), self.page_size)
                .await?;
            report.requests += 1;

            let Some(oldest) = raw.page.oldest_id().cloned() else {
                done = true;
                continue;
            };

            if let Some(previous) = &cursor
                && oldest >= *previous
            {
                return Err(Error::CursorStalled {
                    cursor: previous.to_string(),
                });
            }

            let path = self.store.write_page(&oldest, &raw.body).await?;
            report.pages_written += 1;
            report.messages += raw.page.len();
            info!(
                page = report.pages_written,
                messages = raw.page.len(),
                attachments = raw.page.attachment_count(),
                path = %path.display(),
                "Saved page"
            );

            cursor = Some(oldest);
        }

        if report.pages_written > 0 {
            report.oldest = cursor;
        }
        debug!(requests = report.requests, "Reached the start of the channel");
        info!(
            pages = report.pages_written,
            messages = report.messages,
            oldest = report.oldest.as_ref().map(MessageId::as_str),
            "History fetch complete"
        );
        Ok(report)
    }
}
