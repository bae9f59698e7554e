//! Utility functions for path handling and HTTP header parsing

use std::path::{Component, Path};
use std::time::Duration;

/// Reduce an attachment filename to a single safe path component
///
/// Only the final component of the uploaded name is kept, so a name such as
/// `../../x.png` cannot escape the message directory. Names that reduce to
/// nothing (empty, `.` or `..`) fall back to `attachment_{id}`.
///
/// # Examples
///
/// ```
/// use channel_archiver::utils::safe_file_name;
///
/// assert_eq!(safe_file_name("cat.png", "1"), "cat.png");
/// assert_eq!(safe_file_name("../../etc/passwd", "1"), "passwd");
/// assert_eq!(safe_file_name("..", "42"), "attachment_42");
/// ```
#[must_use]
pub fn safe_file_name(filename: &str, attachment_id: &str) -> String {
    let normalized = filename.replace('\\', "/");
    let last = Path::new(&normalized)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .next_back();

    match last {
        Some(name) if !name.trim().is_empty() => name.to_string(),
        _ => format!("attachment_{}", attachment_id),
    }
}

/// Parse a `Retry-After` header value given in (possibly fractional) seconds
///
/// HTTP-date values are not used by the services this crate talks to and
/// are ignored.
#[must_use]
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let secs: f64 = value.trim().parse().ok()?;
    if secs.is_finite() && secs >= 0.0 {
        Some(Duration::from_secs_f64(secs))
    } else {
        None
    }
}

/// Extract the `Retry-After` delay from a response, if present
pub fn retry_after_from_response(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after)
}
