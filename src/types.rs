//! Core types: decoded channel records and run reports

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;

/// Message identifier, also used as the pagination cursor
///
/// Identifiers are opaque strings on the wire. The remote service issues
/// decimal snowflakes that grow with time, so ordering compares the digit
/// strings numerically: a shorter string (ignoring leading zeros) is older,
/// equal lengths compare lexicographically. The ordering stays total for
/// non-numeric input.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    /// Create a new message identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as it appears on the wire
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn significant(&self) -> &str {
        let trimmed = self.0.trim_start_matches('0');
        if trimmed.is_empty() && !self.0.is_empty() {
            "0"
        } else {
            trimmed
        }
    }
}

impl Ord for MessageId {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a, b) = (self.significant(), other.significant());
        a.len()
            .cmp(&b.len())
            .then_with(|| a.cmp(b))
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for MessageId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Authoring user of a message (informational only)
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// User identifier
    #[serde(default)]
    pub id: String,
    /// Display name
    #[serde(default)]
    pub username: String,
}

/// Binary file attached to a message
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Attachment identifier
    pub id: String,
    /// Original filename as uploaded
    pub filename: String,
    /// Size in bytes
    #[serde(default)]
    pub size: u64,
    /// Primary retrieval URL
    pub url: String,
    /// Secondary (proxy) retrieval URL
    #[serde(default)]
    pub proxy_url: String,
    /// Pixel width; `None` for non-media attachments
    #[serde(default)]
    pub width: Option<u32>,
    /// Pixel height; `None` for non-media attachments
    #[serde(default)]
    pub height: Option<u32>,
    /// MIME content type, when the service reported one
    #[serde(default)]
    pub content_type: Option<String>,
}

impl Attachment {
    /// Pixel dimensions, zero for non-media attachments
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width.unwrap_or(0), self.height.unwrap_or(0))
    }
}

/// One message from the channel history
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message identifier, unique within the channel
    pub id: MessageId,
    /// Body text
    #[serde(default)]
    pub content: String,
    /// Authoring user
    #[serde(default)]
    pub author: Author,
    /// Attachments in upload order
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// Messages returned by one paged-list request, newest first
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Page {
    /// Decoded messages in the order the service listed them
    pub messages: Vec<Message>,
}

impl Page {
    /// Decode a page from the JSON array returned by the paged-list endpoint
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        let messages = serde_json::from_slice(bytes)?;
        Ok(Self { messages })
    }

    /// Whether the page holds no messages (end of history)
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of messages on the page
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Identifier of the last-listed message, the cursor for the next request
    pub fn oldest_id(&self) -> Option<&MessageId> {
        self.messages.last().map(|m| &m.id)
    }

    /// Total number of attachment references on the page
    pub fn attachment_count(&self) -> usize {
        self.messages.iter().map(|m| m.attachments.len()).sum()
    }
}

/// Summary of a history fetch
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FetchReport {
    /// Paged-list requests issued, including the terminating empty one
    pub requests: usize,
    /// Page files written
    pub pages_written: usize,
    /// Messages received across all pages
    pub messages: usize,
    /// Oldest message identifier reached (the frontier), if any page was written
    pub oldest: Option<MessageId>,
}

/// How a single attachment download resolved
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The file was transferred
    Downloaded {
        /// Bytes written to disk
        bytes: u64,
    },
    /// A filesystem entry already existed at the destination
    Skipped,
    /// The transfer failed locally; no file was left behind
    Failed {
        /// Human-readable reason
        reason: String,
    },
}

/// Summary of an attachment materializer run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MaterializeReport {
    /// Page files decoded
    pub pages: usize,
    /// Messages seen across all pages
    pub messages: usize,
    /// Download tasks submitted
    pub scheduled: usize,
    /// Attachments transferred
    pub downloaded: usize,
    /// Attachments already present on disk
    pub skipped: usize,
    /// Attachments that failed locally
    pub failed: usize,
    /// Bytes written across all transfers
    pub bytes: u64,
    /// Destination and reason for every failed attachment
    pub failures: Vec<(PathBuf, String)>,
}

impl MaterializeReport {
    /// Fold one task outcome into the report
    pub fn record(&mut self, destination: PathBuf, outcome: DownloadOutcome) {
        match outcome {
            DownloadOutcome::Downloaded { bytes } => {
                self.downloaded += 1;
                self.bytes += bytes;
            }
            DownloadOutcome::Skipped => self.skipped += 1,
            DownloadOutcome::Failed { reason } => {
                self.failed += 1;
                self.failures.push((destination, reason));
            }
        }
    }
}
