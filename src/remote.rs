//! HTTP access to the remote chat service
//!
//! Both phases talk to the network through a trait so the pagination loop
//! and the download scheduler can be driven by scripted sources in tests:
//! - [`MessageSource`] - one paged-list request per call
//! - [`AttachmentSource`] - opens the byte stream of one attachment

use crate::config::{Config, RetryConfig};
use crate::error::{Error, Result};
use crate::retry::with_retry;
use crate::types::{MessageId, Page};
use crate::utils::retry_after_from_response;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::StatusCode;
use tracing::{debug, warn};

/// Longest slice of an undecodable body echoed into the log
const BODY_PREVIEW_LEN: usize = 256;

/// A page as received: the verbatim body plus its decoded form
#[derive(Clone, Debug)]
pub struct RawPage {
    /// Response body exactly as the service sent it
    pub body: Bytes,
    /// Decoded messages
    pub page: Page,
}

impl RawPage {
    /// Decode a body received from the paged-list endpoint
    pub fn decode(body: Bytes) -> Result<Self> {
        let page = Page::from_slice(&body).inspect_err(|e| {
            let preview = String::from_utf8_lossy(&body[..body.len().min(BODY_PREVIEW_LEN)]);
            warn!(error = %e, body = %preview, "Response is not a page of messages");
        })?;
        Ok(Self { body, page })
    }
}

/// Source of history pages, newest first
#[async_trait::async_trait]
pub trait MessageSource: Send + Sync {
    /// Fetch up to `limit` messages strictly older than `before`
    /// (or the newest messages when `before` is `None`)
    async fn fetch_page(&self, before: Option<&MessageId>, limit: u32) -> Result<RawPage>;
}

/// Body of one attachment as a stream of chunks
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Result of opening an attachment transfer
pub enum Transfer {
    /// The service accepted the request; the body follows
    Body(ByteStream),
    /// The service refused this one attachment (expired link, deleted file, ...)
    Rejected {
        /// HTTP status returned
        status: u16,
    },
}

impl std::fmt::Debug for Transfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transfer::Body(_) => f.write_str("Transfer::Body(..)"),
            Transfer::Rejected { status } => write!(f, "Transfer::Rejected({})", status),
        }
    }
}

/// Source of attachment bytes
#[async_trait::async_trait]
pub trait AttachmentSource: Send + Sync {
    /// Start the transfer of the attachment stored at `url`
    ///
    /// # Errors
    ///
    /// Request construction and transport failures are returned as errors;
    /// a refusal for this single attachment is [`Transfer::Rejected`].
    async fn open(&self, url: &str) -> Result<Transfer>;
}

/// Production [`MessageSource`] for a Discord-style `/channels/{id}/messages` endpoint
pub struct HttpMessageSource {
    client: reqwest::Client,
    endpoint: url::Url,
    auth_token: String,
    retry: RetryConfig,
}

impl HttpMessageSource {
    /// Build a source for the channel and credential in `config`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `config` fails [`Config::validate`], has
    /// no credential, or has a malformed API base URL. Returns
    /// [`Error::Network`] if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let auth_token = config.require_auth()?.to_string();

        let invalid_base = |reason: String| {
            Error::config(
                "api_base_url",
                format!("invalid API base URL {:?}: {}", config.api_base_url, reason),
            )
        };
        let mut endpoint =
            url::Url::parse(&config.api_base_url).map_err(|e| invalid_base(e.to_string()))?;
        endpoint
            .path_segments_mut()
            .map_err(|()| invalid_base("not a hierarchical URL".to_string()))?
            .pop_if_empty()
            .extend(["channels", config.channel.as_str(), "messages"]);

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            endpoint,
            auth_token,
            retry: config.retry.clone(),
        })
    }

    /// URL of one paged-list request
    pub fn page_url(&self, before: Option<&MessageId>, limit: u32) -> url::Url {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &limit.to_string());
            if let Some(before) = before {
                query.append_pair("before", before.as_str());
            }
        }
        url
    }

    async fn request_page(&self, url: &url::Url) -> Result<RawPage> {
        debug!(url = %url, "Requesting page");

        let response = self
            .client
            .get(url.clone())
            .header(reqwest::header::AUTHORIZATION, &self.auth_token)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::Throttled {
                retry_after: retry_after_from_response(&response),
            });
        }
        if !status.is_success() {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.bytes().await?;
        RawPage::decode(body)
    }
}

#[async_trait::async_trait]
impl MessageSource for HttpMessageSource {
    async fn fetch_page(&self, before: Option<&MessageId>, limit: u32) -> Result<RawPage> {
        let url = self.page_url(before, limit);
        with_retry(&self.retry, || self.request_page(&url)).await
    }
}

/// Production [`AttachmentSource`] issuing unauthenticated GET requests
pub struct HttpAttachmentSource {
    client: reqwest::Client,
    retry: RetryConfig,
}

impl HttpAttachmentSource {
    /// Build a source using the per-transfer timeout and User-Agent in `config`
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.attachment_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            retry: config.retry.clone(),
        })
    }

    async fn request(&self, url: &str) -> Result<Transfer> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::Throttled {
                retry_after: retry_after_from_response(&response),
            });
        }
        if status == StatusCode::SERVICE_UNAVAILABLE {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            return Ok(Transfer::Rejected {
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(std::io::Error::other))
            .boxed();
        Ok(Transfer::Body(body))
    }
}

#[async_trait::async_trait]
impl AttachmentSource for HttpAttachmentSource {
    async fn open(&self, url: &str) -> Result<Transfer> {
        match with_retry(&self.retry, || self.request(url)).await {
            // Still unavailable after backing off: give up on this attachment only
            Err(Error::HttpStatus { status, .. }) => Ok(Transfer::Rejected { status }),
            other => other,
        }
    }
}
