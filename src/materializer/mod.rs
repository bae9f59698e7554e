//! Attachment materializer: turns the attachment references in every page file
//! into files under `parsed_{channel}/{messageId}/`.
//!
//! Split into focused submodules:
//! - [`download`] - one attachment: existence check, gated transfer through a `.part` file
//!
//! Scheduling never waits on the admission gate: every download task is
//! spawned while the pages are traversed, and each task acquires a gate slot
//! only for its network and write phase. The run completes once every
//! spawned task has been joined.

mod download;


use crate::config::Config;
use crate::error::{Error, Result};
use crate::remote::{AttachmentSource, HttpAttachmentSource};
use crate::store::RecordStore;
use crate::types::MaterializeReport;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

pub(crate) use download::{AttachmentJob, download_attachment};

/// Bounded-concurrency downloader for every attachment in a record store
pub struct Materializer {
    store: RecordStore,
    source: Arc<dyn AttachmentSource>,
    /// Admission gate: one permit per in-progress transfer
    gate: Arc<Semaphore>,
}

impl Materializer {
    /// Create a materializer allowing at most `max_concurrent` simultaneous transfers
    pub fn new(
        store: RecordStore,
        source: Arc<dyn AttachmentSource>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            store,
            source,
            gate: Arc::new(Semaphore::new(max_concurrent)),
        }
    }

    /// Create a materializer for the channel in `config`, downloading over HTTP
    pub fn from_config(config: &Config) -> Result<Self> {
        let source = Arc::new(HttpAttachmentSource::new(config)?);
        Ok(Self::new(
            RecordStore::from_config(config),
            source,
            config.max_concurrent_downloads,
        ))
    }

    /// Download every attachment referenced by every page file
    ///
    /// # Errors
    ///
    /// A page that cannot be read or decoded, a message directory that cannot
    /// be created, or a systemic transport failure in any task aborts the
    /// run; in-flight transfers are cancelled. Failures local to one
    /// attachment are counted in the report instead.
    pub async fn run(&self) -> Result<MaterializeReport> {
        self.store.ensure_parsed_dir().await?;
        let pages = self.store.page_files()?;
        info!(
            channel = self.store.channel(),
            pages = pages.len(),
            "Materializing attachments"
        );

        let mut report = MaterializeReport::default();
        let mut tasks = JoinSet::new();
        let mut scheduled = HashSet::new();

        for path in pages {
            let page = self.store.read_page(&path).await?;
            report.pages += 1;
            debug!(path = %path.display(), messages = page.len(), "Scheduling page");

            for message in page.messages {
                report.messages += 1;
                let message_dir = self.store.message_dir(&message.id);
                tokio::fs::create_dir_all(&message_dir).await?;

                for attachment in &message.attachments {
                    let destination = self.store.attachment_path(&message.id, attachment);
                    if !scheduled.insert(destination.clone()) {
                        debug!(
                            path = %destination.display(),
                            "Attachment already scheduled in this run"
                        );
                        continue;
                    }

                    let job = AttachmentJob {
                        message_id: message.id.clone(),
                        url: attachment.url.clone(),
                        destination,
                    };
                    let source = Arc::clone(&self.source);
                    let gate = Arc::clone(&self.gate);
                    tasks.spawn(async move {
                        let outcome = download_attachment(&job, source.as_ref(), gate).await;
                        (job, outcome)
                    });
                    report.scheduled += 1;
                }
            }
        }

        info!(scheduled = report.scheduled, "All downloads submitted");

        while let Some(joined) = tasks.join_next().await {
            let (job, outcome) = joined.map_err(|e| Error::TaskFailed(e.to_string()))?;
            match outcome {
                Ok(outcome) => report.record(job.destination, outcome),
                Err(e) => {
                    error!(
                        message = %job.message_id,
                        url = %job.url,
                        error = %e,
                        "Attachment transfer failed, aborting"
                    );
                    tasks.abort_all();
                    return Err(e);
                }
            }
        }

        if report.failed > 0 {
            warn!(failed = report.failed, "Some attachments could not be downloaded");
        }
        info!(
            downloaded = report.downloaded,
            skipped = report.skipped,
            failed = report.failed,
            bytes = report.bytes,
            "Done materializing {}",
            self.store.raw_dir().display()
        );
        Ok(report)
    }
}
