//! Test configuration helpers pointing both endpoints at a mock server

use channel_archiver::{Config, RetryConfig};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::MockServer;

/// Channel id used by every end-to-end test
pub const CHANNEL: &str = "42";

/// Credential the mock history endpoint expects
pub const TOKEN: &str = "secret-token";

/// Config archiving [`CHANNEL`] from `server` into `output`
///
/// Retries are kept short so throttling tests finish quickly.
pub fn test_config(server: &MockServer, output: &TempDir) -> Config {
    let mut config = Config::for_channel(CHANNEL);
    config.api_base_url = format!("{}/api/v9", server.uri());
    config.auth_token = Some(TOKEN.to_string());
    config.output_dir = output.path().to_path_buf();
    config.attachment_timeout = Duration::from_secs(5);
    config.request_timeout = Duration::from_secs(5);
    config.retry = RetryConfig {
        max_attempts: 3,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        backoff_multiplier: 2.0,
        jitter: false,
    };
    config
}
