//! Download of a single attachment.

use crate::error::{Error, Result};
use crate::remote::{AttachmentSource, ByteStream, Transfer};
use crate::types::{DownloadOutcome, MessageId};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// One scheduled attachment transfer
#[derive(Clone, Debug)]
pub(crate) struct AttachmentJob {
    pub(crate) message_id: MessageId,
    pub(crate) url: String,
    pub(crate) destination: PathBuf,
}

/// Materialize one attachment at `job.destination`
///
/// An existing entry at the destination counts as done (existence only, no
/// size or content check). Otherwise a gate permit is held for the whole
/// transfer and released when this function returns, whichever way it returns.
///
/// # Errors
///
/// Only systemic failures are errors: request construction and transport
/// failures other than the per-transfer timeout. Everything else resolves
/// as [`DownloadOutcome::Failed`].
pub(crate) async fn download_attachment(
    job: &AttachmentJob,
    source: &dyn AttachmentSource,
    gate: Arc<Semaphore>,
) -> Result<DownloadOutcome> {
    if tokio::fs::symlink_metadata(&job.destination).await.is_ok() {
        debug!(path = %job.destination.display(), "Already downloaded");
        return Ok(DownloadOutcome::Skipped);
    }

    let _permit = gate
        .acquire_owned()
        .await
        .map_err(|e| Error::TaskFailed(e.to_string()))?;

    info!(path = %job.destination.display(), "Downloading");
    let body = match source.open(&job.url).await {
        Ok(Transfer::Body(body)) => body,
        Ok(Transfer::Rejected { status }) => {
            warn!(
                path = %job.destination.display(),
                url = %job.url,
                status,
                "Attachment refused by server"
            );
            return Ok(DownloadOutcome::Failed {
                reason: format!("HTTP {}", status),
            });
        }
        Err(e) if e.is_timeout() => {
            warn!(path = %job.destination.display(), error = %e, "Attachment transfer timed out");
            return Ok(DownloadOutcome::Failed {
                reason: e.to_string(),
            });
        }
        Err(e) => return Err(e),
    };

    Ok(write_body(&job.destination, body).await)
}

/// Stream `body` into `destination`
///
/// The bytes land in a sibling `.part` file that is renamed over
/// `destination` only once the whole body is on disk, so `destination`
/// never holds a truncated attachment, not even when the task is aborted
/// mid-transfer. Failures here are local to this attachment.
pub(crate) async fn write_body(destination: &Path, mut body: ByteStream) -> DownloadOutcome {
    let part = part_path(destination);
    let written = match stream_to_file(&part, &mut body).await {
        Ok(bytes) => tokio::fs::rename(&part, destination).await.map(|()| bytes),
        Err(e) => Err(e),
    };

    match written {
        Ok(bytes) => {
            debug!(path = %destination.display(), bytes, "Attachment written");
            DownloadOutcome::Downloaded { bytes }
        }
        Err(e) => {
            warn!(
                path = %destination.display(),
                error = %e,
                "Couldn't write attachment, discarding partial file"
            );
            match tokio::fs::remove_file(&part).await {
                Ok(()) => {}
                Err(cleanup) if cleanup.kind() == std::io::ErrorKind::NotFound => {}
                Err(cleanup) => {
                    warn!(path = %part.display(), error = %cleanup, "Couldn't remove partial file");
                }
            }
            DownloadOutcome::Failed {
                reason: e.to_string(),
            }
        }
    }
}

/// Temporary sibling a transfer is streamed into: `dir/.name.part`
pub(crate) fn part_path(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    destination.with_file_name(format!(".{}.part", name))
}

async fn stream_to_file(path: &Path, body: &mut ByteStream) -> std::io::Result<u64> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}
