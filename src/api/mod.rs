//! HTTP client for the AI Tools Hub history and chat endpoints.
//!
//! This is the only place that sees raw wire records. Responses are decoded
//! per record: one malformed entry is logged and skipped, never failing the
//! whole fetch, so the rest of the program only ever handles well-formed
//! [`LogEntry`] values.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::errors::AppError;
use crate::models::{ChatTurn, LogEntry, Message};

/// Shown in place of a model reply the backend failed to include.
const MISSING_REPLY_PLACEHOLDER: &str = "No response from AI";

/// The remote history store: flat log entries in, individual deletions and
/// chat turns out. [`HistoryClient`] is the production implementation;
/// tests substitute in-memory fakes.
#[async_trait]
pub trait HistoryStore {
    /// Returns every entry visible to the authenticated user. Ordering
    /// within a conversation is the store's guarantee, not re-derived here.
    async fn fetch_entries(&self) -> Result<Vec<LogEntry>, AppError>;

    /// Deletes a single entry.
    async fn delete_entry(&self, id: i64) -> Result<(), AppError>;

    /// Runs one chat turn: the thread's messages (ending in the pending user
    /// message) go up, the model's reply comes back.
    async fn send_chat(
        &self,
        conversation_id: &str,
        messages: &[Message],
    ) -> Result<ChatTurn, AppError>;
}

// ── Wire types ───────────────────────────────────────────────────────────────

/// A history record as the backend serializes it. Everything is optional at
/// this layer; [`decode_entry`] decides what is usable.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLogEntry {
    id: Option<i64>,
    conversation_id: Option<String>,
    input: Option<String>,
    response: Option<String>,
    timestamp: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequestBody<'a> {
    messages: &'a [Message],
    conversation_id: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatReplyBody {
    extracted_text: Option<String>,
    id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

fn decode_entry(raw: RawLogEntry) -> Option<LogEntry> {
    match raw {
        RawLogEntry {
            id: Some(id),
            conversation_id,
            input: Some(input),
            response: Some(response),
            timestamp: Some(timestamp),
        } => Some(LogEntry { id, conversation_id, input, response, timestamp }),
        raw => {
            warn!("Skipping malformed history entry: {raw:?}");
            None
        }
    }
}

// ── Client ───────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct HistoryClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HistoryClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { http, base_url, token: token.into() }
    }

    /// Maps a non-success response to a typed error, preferring the
    /// backend's `{"error": ...}` body text when it sends one.
    async fn status_error(response: reqwest::Response, entry_id: Option<i64>) -> AppError {
        let status = response.status();
        match (status.as_u16(), entry_id) {
            (401, _) => AppError::Unauthorized,
            (403, Some(id)) => AppError::Forbidden { id },
            (404, Some(id)) => AppError::EntryNotFound { id },
            (code, _) => {
                let message = response
                    .json::<ErrorBody>()
                    .await
                    .ok()
                    .and_then(|body| body.error)
                    .unwrap_or_else(|| status.to_string());
                AppError::ServerError { status: code, message }
            }
        }
    }
}

#[async_trait]
impl HistoryStore for HistoryClient {
    async fn fetch_entries(&self) -> Result<Vec<LogEntry>, AppError> {
        let url = format!("{}/api/tools/history/chatbot", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to fetch chat history: {e}");
                AppError::http("Failed to fetch chat history", e)
            })?;

        if !response.status().is_success() {
            return Err(Self::status_error(response, None).await);
        }

        // Decode each record on its own so a single malformed row cannot
        // take the whole history down with it.
        let raw: Vec<serde_json::Value> = response.json().await.map_err(|e| {
            error!("Failed to decode chat history: {e}");
            AppError::DecodeFailed { message: e.to_string() }
        })?;

        Ok(raw
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<RawLogEntry>(value) {
                Ok(raw) => decode_entry(raw),
                Err(e) => {
                    warn!("Skipping undecodable history entry: {e}");
                    None
                }
            })
            .collect())
    }

    async fn delete_entry(&self, id: i64) -> Result<(), AppError> {
        let url = format!("{}/api/tools/history/chatbot/{id}", self.base_url);
        let response = self
            .http
            .delete(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to delete history entry {id}: {e}");
                AppError::http(format!("Failed to delete history entry {id}"), e)
            })?;

        if !response.status().is_success() {
            return Err(Self::status_error(response, Some(id)).await);
        }
        Ok(())
    }

    async fn send_chat(
        &self,
        conversation_id: &str,
        messages: &[Message],
    ) -> Result<ChatTurn, AppError> {
        let url = format!("{}/api/tools/chatbot", self.base_url);
        let body = ChatRequestBody { messages, conversation_id };
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Chat request failed for conversation {conversation_id}: {e}");
                AppError::http("Chat request failed", e)
            })?;

        if !response.status().is_success() {
            return Err(Self::status_error(response, None).await);
        }

        let reply: ChatReplyBody = response.json().await.map_err(|e| {
            error!("Failed to decode chat reply: {e}");
            AppError::DecodeFailed { message: e.to_string() }
        })?;

        if reply.id.is_none() {
            warn!("Chat reply for conversation {conversation_id} carries no entry id");
        }

        Ok(ChatTurn {
            reply: reply
                .extracted_text
                .unwrap_or_else(|| MISSING_REPLY_PLACEHOLDER.to_string()),
            entry_id: reply.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageRole;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> HistoryClient {
        HistoryClient::new(reqwest::Client::new(), server.uri(), "test-token")
    }

    #[tokio::test]
    async fn fetch_entries_decodes_records_and_skips_malformed_ones() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tools/history/chatbot"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {
                    "id": 1,
                    "conversationId": "c1",
                    "input": "hi",
                    "response": "hello",
                    "timestamp": "2024-01-01T10:00:00Z"
                },
                // Legacy record: no conversation id, still decodes.
                {
                    "id": 2,
                    "input": "orphan",
                    "response": "reply",
                    "timestamp": "2024-01-01T11:00:00Z"
                },
                // Malformed: no input, skipped.
                { "id": 3, "conversationId": "c1", "timestamp": "2024-01-01T12:00:00Z" },
                // Malformed: unparseable timestamp, skipped.
                {
                    "id": 4,
                    "conversationId": "c1",
                    "input": "x",
                    "response": "y",
                    "timestamp": "not-a-date"
                }
            ])))
            .mount(&server)
            .await;

        let entries = client(&server).fetch_entries().await.unwrap();
        let ids: Vec<i64> = entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(entries[0].conversation_id.as_deref(), Some("c1"));
        assert_eq!(entries[1].conversation_id, None);
    }

    #[tokio::test]
    async fn fetch_entries_maps_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tools/history/chatbot"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client(&server).fetch_entries().await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }

    #[tokio::test]
    async fn delete_entry_maps_not_found_and_forbidden() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/tools/history/chatbot/7"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/tools/history/chatbot/8"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let api = client(&server);
        assert!(matches!(
            api.delete_entry(7).await.unwrap_err(),
            AppError::EntryNotFound { id: 7 }
        ));
        assert!(matches!(
            api.delete_entry(8).await.unwrap_err(),
            AppError::Forbidden { id: 8 }
        ));
    }

    #[tokio::test]
    async fn delete_entry_surfaces_server_error_body() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/tools/history/chatbot/9"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(serde_json::json!({ "error": "database on fire" })),
            )
            .mount(&server)
            .await;

        let err = client(&server).delete_entry(9).await.unwrap_err();
        match err {
            AppError::ServerError { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "database on fire");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn send_chat_returns_reply_and_entry_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/tools/chatbot"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "extractedText": "the answer",
                "id": 42
            })))
            .mount(&server)
            .await;

        let messages = vec![Message::new(
            MessageRole::User,
            "question",
            "2024-01-01T10:00:00Z".parse().unwrap(),
        )];
        let turn = client(&server).send_chat("c1", &messages).await.unwrap();
        assert_eq!(turn, ChatTurn { reply: "the answer".to_string(), entry_id: Some(42) });
    }

    #[tokio::test]
    async fn send_chat_falls_back_when_reply_text_is_missing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/tools/chatbot"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let turn = client(&server).send_chat("c1", &[]).await.unwrap();
        assert_eq!(turn.reply, "No response from AI");
        assert_eq!(turn.entry_id, None);
    }
}
