//! Mock channel history and attachment fixtures

use serde_json::{Value, json};
use std::collections::HashMap;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use super::config::{CHANNEL, TOKEN};

/// Path of the paged-list endpoint on the mock server
pub fn messages_path() -> String {
    format!("/api/v9/channels/{}/messages", CHANNEL)
}

/// Path of one attachment on the mock server
pub fn attachment_path(message_id: u64, filename: &str) -> String {
    format!("/attachments/{}/{}", message_id, filename)
}

/// JSON for one message as the service lists it
pub fn message_json(server: &MockServer, id: u64, filenames: &[&str]) -> Value {
    let attachments: Vec<Value> = filenames
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let url = format!("{}{}", server.uri(), attachment_path(id, name));
            json!({
                "id": format!("{}{}", id, i),
                "filename": name,
                "size": 5,
                "url": url,
                "proxy_url": url,
                "width": null,
                "height": null,
            })
        })
        .collect();

    json!({
        "id": id.to_string(),
        "content": format!("message {}", id),
        "author": { "id": "7", "username": "archivist" },
        "attachments": attachments,
    })
}

/// Channel history served with the service's `before`/`limit` semantics
///
/// Returns messages strictly older than `before` (or the newest ones when the
/// parameter is absent), newest first, at most `limit` of them.
pub struct ChannelHistory {
    /// `(id, json)` pairs, newest first
    messages: Vec<(u64, Value)>,
}

impl ChannelHistory {
    /// History holding `messages`, in any order
    pub fn new(mut messages: Vec<(u64, Value)>) -> Self {
        messages.sort_by(|a, b| b.0.cmp(&a.0));
        Self { messages }
    }
}

impl Respond for ChannelHistory {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let query: HashMap<String, String> = request.url.query_pairs().into_owned().collect();
        let limit = query
            .get("limit")
            .and_then(|l| l.parse::<usize>().ok())
            .unwrap_or(50);
        let before = query.get("before").and_then(|b| b.parse::<u64>().ok());

        let page: Vec<&Value> = self
            .messages
            .iter()
            .filter(|(id, _)| before.is_none_or(|b| *id < b))
            .take(limit)
            .map(|(_, message)| message)
            .collect();
        ResponseTemplate::new(200).set_body_json(page)
    }
}

/// Mount `history` on the paged-list endpoint, requiring the test credential
pub async fn mount_history(server: &MockServer, history: ChannelHistory) {
    Mock::given(method("GET"))
        .and(path(messages_path()))
        .and(header("authorization", TOKEN))
        .respond_with(history)
        .mount(server)
        .await;
}

/// Serve `body` for one attachment, expecting exactly one download
pub async fn mount_attachment(server: &MockServer, message_id: u64, filename: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(attachment_path(message_id, filename)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .expect(1)
        .mount(server)
        .await;
}

/// The `before` cursor of every request the history endpoint received, in order
pub async fn history_cursors(server: &MockServer) -> Vec<Option<String>> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == messages_path())
        .map(|r| {
            r.url
                .query_pairs()
                .find(|(k, _)| k == "before")
                .map(|(_, v)| v.into_owned())
        })
        .collect()
}

/// Number of attachment requests the mock server received
pub async fn attachment_requests(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path().starts_with("/attachments/"))
        .count()
}
