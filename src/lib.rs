//! # channel-archiver
//!
//! One-shot bulk exporter for a chat channel's message history and the
//! attachments those messages reference.
//!
//! Archiving runs in two independent phases that share nothing but the
//! on-disk record store:
//! - [`HistoryFetcher`] walks the history backwards page by page and writes
//!   every page verbatim to `raw_{channel}/{channel}_{oldestId}.json`
//! - [`Materializer`] reads those pages and downloads every attachment to
//!   `parsed_{channel}/{messageId}/{filename}`, at most ten at a time,
//!   skipping files that already exist
//!
//! Both phases are safe to re-run: the fetcher resumes from any cursor and
//! the materializer only transfers what is missing.
//!
//! ## Quick Start
//!
//! ```no_run
//! use channel_archiver::{Config, HistoryFetcher, HttpMessageSource, Materializer, RecordStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::for_channel("123456789012345678");
//!     config.auth_token = Some("token".to_string());
//!     config.validate()?;
//!
//!     let source = HttpMessageSource::new(&config)?;
//!     let fetcher = HistoryFetcher::new(source, RecordStore::from_config(&config), config.page_size);
//!     let fetched = fetcher.run(None).await?;
//!     println!("saved {} pages", fetched.pages_written);
//!
//!     let report = Materializer::from_config(&config)?.run().await?;
//!     println!("downloaded {} attachments", report.downloaded);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Paginated history retrieval
pub mod fetcher;
/// Bounded-concurrency attachment downloads
pub mod materializer;
/// HTTP access to the remote service
pub mod remote;
/// Retry logic with exponential backoff
pub mod retry;
/// On-disk record store
pub mod store;
/// Core types and run reports
pub mod types;
/// Utility functions
pub mod utils;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use config::{Config, RetryConfig};
pub use error::{Error, Result};
pub use fetcher::HistoryFetcher;
pub use materializer::Materializer;
pub use remote::{AttachmentSource, HttpAttachmentSource, HttpMessageSource, MessageSource};
pub use store::RecordStore;
pub use types::{
    Attachment, Author, DownloadOutcome, FetchReport, MaterializeReport, Message, MessageId, Page,
};
