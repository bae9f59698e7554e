//! In-memory sources shared by the fetcher and materializer tests.

use crate::error::{Error, Result};
use crate::remote::{AttachmentSource, MessageSource, RawPage, Transfer};
use crate::types::{Attachment, Author, Message, MessageId};
use bytes::Bytes;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Build a message with one attachment per filename
pub(crate) fn message(id: u64, filenames: &[&str]) -> Message {
    Message {
        id: MessageId::new(id.to_string()),
        content: format!("message {id}"),
        author: Author {
            id: "1".into(),
            username: "tester".into(),
        },
        attachments: filenames
            .iter()
            .enumerate()
            .map(|(i, name)| Attachment {
                id: format!("{id}{i}"),
                filename: name.to_string(),
                size: 3,
                url: format!("mem://{id}/{name}"),
                proxy_url: String::new(),
                width: None,
                height: None,
                content_type: None,
            })
            .collect(),
    }
}

/// A channel history served with real `before` semantics
///
/// Messages are held newest first; every request is recorded so tests can
/// assert on the cursors that were sent.
pub(crate) struct SimulatedChannel {
    messages: Vec<Message>,
    requests: Mutex<Vec<Option<MessageId>>>,
    fail_on_request: Option<usize>,
}

impl SimulatedChannel {
    /// History with message ids `1..=count`, no attachments
    pub(crate) fn with_ids(count: u64) -> Self {
        Self::new((1..=count).map(|id| message(id, &[])).collect())
    }

    pub(crate) fn new(mut messages: Vec<Message>) -> Self {
        messages.sort_by(|a, b| b.id.cmp(&a.id));
        Self {
            messages,
            requests: Mutex::new(Vec::new()),
            fail_on_request: None,
        }
    }

    /// Make the `n`th request (1-based) fail with a transport-style error
    pub(crate) fn failing_on_request(mut self, n: usize) -> Self {
        self.fail_on_request = Some(n);
        self
    }

    pub(crate) fn requests(&self) -> Vec<Option<MessageId>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl MessageSource for SimulatedChannel {
    async fn fetch_page(&self, before: Option<&MessageId>, limit: u32) -> Result<RawPage> {
        let request_number = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(before.cloned());
            requests.len()
        };
        if self.fail_on_request == Some(request_number) {
            return Err(Error::HttpStatus {
                status: 502,
                url: "mem://channel".into(),
            });
        }

        let page: Vec<&Message> = self
            .messages
            .iter()
            .filter(|m| before.is_none_or(|b| m.id < *b))
            .take(limit as usize)
            .collect();
        let body = serde_json::to_vec(&page)?;
        RawPage::decode(Bytes::from(body))
    }
}

/// Pages returned verbatim in order, regardless of the cursor
pub(crate) struct ScriptedPages {
    bodies: Mutex<std::collections::VecDeque<&'static str>>,
}

impl ScriptedPages {
    pub(crate) fn new(bodies: Vec<&'static str>) -> Self {
        Self {
            bodies: Mutex::new(bodies.into()),
        }
    }
}

#[async_trait::async_trait]
impl MessageSource for ScriptedPages {
    async fn fetch_page(&self, _before: Option<&MessageId>, _limit: u32) -> Result<RawPage> {
        let body = self.bodies.lock().unwrap().pop_front().unwrap_or("[]");
        RawPage::decode(Bytes::from_static(body.as_bytes()))
    }
}

/// How a scripted attachment URL behaves
#[derive(Clone, Debug)]
pub(crate) enum Script {
    /// Serve these chunks
    Body(Vec<&'static str>),
    /// Serve the chunks, then fail the stream
    BreakAfter(Vec<&'static str>),
    /// Refuse with this status
    Status(u16),
    /// Serve the chunks, then never produce another one
    Stall(Vec<&'static str>),
    /// Fail to open (systemic transport failure)
    Unreachable,
    /// Fail to open once this much time has passed
    UnreachableAfter(Duration),
}

/// Counts one transfer as in flight until dropped
struct InFlight {
    counter: Arc<AtomicUsize>,
}

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>, peak: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self {
            counter: Arc::clone(counter),
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// [`AttachmentSource`] with per-URL scripts and concurrency instrumentation
pub(crate) struct ScriptedAttachments {
    scripts: HashMap<String, Script>,
    default: Script,
    delay: Duration,
    opened: Mutex<Vec<String>>,
    in_flight: Arc<AtomicUsize>,
    peak: AtomicUsize,
}

impl ScriptedAttachments {
    /// Every URL serves `abc` unless scripted otherwise
    pub(crate) fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            default: Script::Body(vec!["abc"]),
            delay: Duration::ZERO,
            opened: Mutex::new(Vec::new()),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: AtomicUsize::new(0),
        }
    }

    pub(crate) fn script(mut self, url: &str, script: Script) -> Self {
        self.scripts.insert(url.to_string(), script);
        self
    }

    /// Wait `delay` before answering and before every body chunk
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    /// Highest number of transfers observed in flight at once
    ///
    /// A transfer counts from `open` until its body stream is dropped.
    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AttachmentSource for ScriptedAttachments {
    async fn open(&self, url: &str) -> Result<Transfer> {
        self.opened.lock().unwrap().push(url.to_string());

        let guard = InFlight::enter(&self.in_flight, &self.peak);
        tokio::time::sleep(self.delay).await;

        let script = self.scripts.get(url).unwrap_or(&self.default).clone();
        let chunks = |parts: Vec<&'static str>| {
            parts
                .into_iter()
                .map(|p| Ok(Bytes::from_static(p.as_bytes())))
                .collect::<Vec<std::io::Result<Bytes>>>()
        };
        let items = match script {
            Script::Body(parts) => chunks(parts),
            Script::BreakAfter(parts) => {
                let mut items = chunks(parts);
                items.push(Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "connection reset mid-body",
                )));
                items
            }
            Script::Stall(parts) => {
                let body = futures::stream::iter(chunks(parts))
                    .chain(futures::stream::pending::<std::io::Result<Bytes>>())
                    .map(move |chunk| {
                        let _held = &guard;
                        chunk
                    });
                return Ok(Transfer::Body(body.boxed()));
            }
            Script::Status(status) => return Ok(Transfer::Rejected { status }),
            Script::Unreachable => return Err(unreachable()),
            Script::UnreachableAfter(after) => {
                tokio::time::sleep(after).await;
                return Err(unreachable());
            }
        };

        let delay = self.delay;
        let body = futures::stream::iter(items).then(move |chunk| {
            let _held = &guard;
            async move {
                tokio::time::sleep(delay).await;
                chunk
            }
        });
        Ok(Transfer::Body(body.boxed()))
    }
}

fn unreachable() -> Error {
    Error::Io(std::io::Error::new(
        std::io::ErrorKind::NotConnected,
        "network is down",
    ))
}
