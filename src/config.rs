//! Configuration types for channel-archiver

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default REST API root of the remote chat service
pub const DEFAULT_API_BASE_URL: &str = "https://discord.com/api/v9";

/// User-Agent sent with every request to either endpoint
pub const DEFAULT_USER_AGENT: &str = "channel-archiver/0.1 (one-shot channel backup)";

/// Main configuration shared by the history fetcher and the attachment materializer
///
/// Built once at startup and shared read-only (`Arc<Config>`) for the rest of
/// the process.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Channel identifier to archive (required)
    #[serde(default)]
    pub channel: String,

    /// Authorization credential for the paged-list endpoint
    ///
    /// Never serialized so a dumped config cannot leak the token.
    #[serde(default, skip_serializing)]
    pub auth_token: Option<String>,

    /// REST API root (default: Discord v9)
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// User-Agent header value
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Directory under which `raw_{channel}` and `parsed_{channel}` live (default: ".")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Messages requested per page (default: 100, the service maximum)
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Maximum simultaneous attachment transfers (default: 10)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,

    /// Per-transfer timeout for attachment downloads (default: 60 seconds)
    #[serde(default = "default_attachment_timeout", with = "duration_serde")]
    pub attachment_timeout: Duration,

    /// Timeout for one paged-list request (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Backoff policy for throttled or transiently failing requests
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channel: String::new(),
            auth_token: None,
            api_base_url: default_api_base_url(),
            user_agent: default_user_agent(),
            output_dir: default_output_dir(),
            page_size: default_page_size(),
            max_concurrent_downloads: default_max_concurrent(),
            attachment_timeout: default_attachment_timeout(),
            request_timeout: default_request_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    /// Create a configuration for one channel with every other setting defaulted
    pub fn for_channel(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            ..Default::default()
        }
    }

    /// Check the settings that every mode depends on
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        if self.channel.trim().is_empty() {
            return Err(Error::config("channel", "channel argument is required"));
        }
        if self
            .channel
            .chars()
            .any(|c| std::path::is_separator(c) || c == '.')
        {
            return Err(Error::config(
                "channel",
                format!("channel id {:?} contains path characters", self.channel),
            ));
        }
        if self.page_size == 0 {
            return Err(Error::config("page_size", "page size must be at least 1"));
        }
        if self.max_concurrent_downloads == 0 {
            return Err(Error::config(
                "max_concurrent_downloads",
                "at least one concurrent download is required",
            ));
        }
        Ok(())
    }

    /// The credential, or a configuration error if none was resolved
    pub fn require_auth(&self) -> Result<&str> {
        self.auth_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::config("auth", "no authorization token configured"))
    }
}

/// Retry configuration for throttled and transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// A policy that never retries
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            ..Default::default()
        }
    }
}

/// Resolve the authorization credential
///
/// A non-empty `explicit` value wins. Otherwise the token is read from
/// `auth_file` with surrounding whitespace trimmed.
///
/// # Errors
///
/// Returns [`Error::Config`] if the file cannot be read or holds only whitespace.
pub fn resolve_auth_token(explicit: Option<&str>, auth_file: &Path) -> Result<String> {
    if let Some(token) = explicit.map(str::trim)
        && !token.is_empty()
    {
        return Ok(token.to_string());
    }

    let data = std::fs::read_to_string(auth_file).map_err(|e| {
        Error::config(
            "auth",
            format!(
                "auth argument is empty and auth file {} could not be read: {}",
                auth_file.display(),
                e
            ),
        )
    })?;

    let token = data.trim();
    if token.is_empty() {
        return Err(Error::config(
            "auth",
            format!("auth file {} is empty", auth_file.display()),
        ));
    }
    Ok(token.to_string())
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_page_size() -> u32 {
    100
}

fn default_max_concurrent() -> usize {
    10
}

fn default_attachment_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
