//! On-disk record store layout
//!
//! ```text
//! {output_dir}/
//!   raw_{channel}/
//!     {channel}_{oldestMessageId}.json     one page, verbatim response body
//!   parsed_{channel}/
//!     {messageId}/
//!       {attachmentFilename}               one materialized attachment
//! ```
//!
//! Page files are write-once: the fetcher creates them and nothing in this
//! crate modifies or deletes them afterwards.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{Attachment, MessageId, Page};
use crate::utils::safe_file_name;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Extension every page file carries
pub const PAGE_EXTENSION: &str = "json";

/// Paths and persistence for one channel's records
#[derive(Clone, Debug)]
pub struct RecordStore {
    root: PathBuf,
    channel: String,
}

impl RecordStore {
    /// Create a store for `channel` rooted at `root`
    pub fn new(root: impl Into<PathBuf>, channel: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            channel: channel.into(),
        }
    }

    /// Create the store described by a configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.output_dir.clone(), config.channel.clone())
    }

    /// Channel this store belongs to
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Directory holding page files
    pub fn raw_dir(&self) -> PathBuf {
        self.root.join(format!("raw_{}", self.channel))
    }

    /// Directory holding materialized attachments
    pub fn parsed_dir(&self) -> PathBuf {
        self.root.join(format!("parsed_{}", self.channel))
    }

    /// File name of the page whose oldest message is `oldest`
    pub fn page_file_name(&self, oldest: &MessageId) -> String {
        format!("{}_{}.{}", self.channel, oldest, PAGE_EXTENSION)
    }

    /// Full path of the page whose oldest message is `oldest`
    pub fn page_path(&self, oldest: &MessageId) -> PathBuf {
        self.raw_dir().join(self.page_file_name(oldest))
    }

    /// Directory scoped to one message's attachments
    pub fn message_dir(&self, message_id: &MessageId) -> PathBuf {
        self.parsed_dir().join(message_id.as_str())
    }

    /// Destination of one attachment; the idempotency key of its download
    pub fn attachment_path(&self, message_id: &MessageId, attachment: &Attachment) -> PathBuf {
        self.message_dir(message_id)
            .join(safe_file_name(&attachment.filename, &attachment.id))
    }

    /// Create the page directory if it does not exist yet
    pub async fn ensure_raw_dir(&self) -> Result<PathBuf> {
        let dir = self.raw_dir();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Create the attachment root directory if it does not exist yet
    pub async fn ensure_parsed_dir(&self) -> Result<PathBuf> {
        let dir = self.parsed_dir();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Persist the verbatim body of one page
    ///
    /// An existing file with the same name is replaced; re-fetching from the
    /// same cursor reproduces the same name and content.
    pub async fn write_page(&self, oldest: &MessageId, body: &[u8]) -> Result<PathBuf> {
        let path = self.page_path(oldest);
        tokio::fs::write(&path, body).await?;
        Ok(path)
    }

    /// Every page file under the raw directory, sorted by path
    ///
    /// The directory is walked recursively. Entries without the page
    /// extension are logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the raw directory does not exist and
    /// [`Error::Io`] if it cannot be traversed.
    pub fn page_files(&self) -> Result<Vec<PathBuf>> {
        let raw_dir = self.raw_dir();
        if !raw_dir.is_dir() {
            return Err(Error::config(
                "channel",
                format!(
                    "record store {} does not exist; fetch the history first",
                    raw_dir.display()
                ),
            ));
        }

        let mut pages = Vec::new();
        for entry in walkdir::WalkDir::new(&raw_dir).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.into_path();
            if path.extension().and_then(|e| e.to_str()) != Some(PAGE_EXTENSION) {
                warn!(path = %path.display(), "Ignoring file that is not a page record");
                continue;
            }
            pages.push(path);
        }
        Ok(pages)
    }

    /// Read and decode one page file
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and
    /// [`Error::InvalidPage`] if it does not hold a JSON array of messages.
    pub async fn read_page(&self, path: &Path) -> Result<Page> {
        let data = tokio::fs::read(path).await?;
        Page::from_slice(&data).map_err(|e| Error::InvalidPage {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Oldest message identifier recorded in any page file name
    ///
    /// This is the cursor from which an interrupted fetch resumes. Returns
    /// `Ok(None)` when no page has been written yet.
    pub fn frontier(&self) -> Result<Option<MessageId>> {
        if !self.raw_dir().is_dir() {
            return Ok(None);
        }

        let prefix = format!("{}_", self.channel);
        let suffix = format!(".{}", PAGE_EXTENSION);
        let oldest = self
            .page_files()?
            .iter()
            .filter_map(|path| path.file_name().and_then(|n| n.to_str()))
            .filter_map(|name| name.strip_prefix(&prefix)?.strip_suffix(&suffix))
            .filter(|id| !id.is_empty())
            .map(MessageId::from)
            .min();
        Ok(oldest)
    }
}
