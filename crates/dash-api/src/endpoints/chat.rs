//! Chat assistant endpoints

use crate::client::ApiClient;
use crate::error::Result;
use crate::serde_util::lenient_datetime;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};

/// Symbols attached to a chat turn or session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatContext {
    #[serde(default)]
    pub symbols: Vec<String>,
}

impl ChatContext {
    pub fn with_symbols(symbols: Vec<String>) -> Self {
        Self { symbols }
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// A persisted conversation thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    #[serde(alias = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub context: Option<ChatContext>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub message_count: Option<u64>,
}

/// A stored message from `GET /chatbot/history/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    #[serde(default, alias = "_id")]
    pub id: Option<String>,
    pub content: String,
    pub is_user: bool,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Body of `POST /chatbot/chat`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub message: String,
    /// Absent for a new conversation; the backend allocates one
    pub session_id: Option<String>,
    pub context: Option<ChatContext>,
}

/// Assistant answer to a chat turn
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatReply {
    pub message: String,
    pub session_id: String,
    #[serde(default)]
    pub context: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct NewSession<'a> {
    title: &'a str,
    context: &'a ChatContext,
}

/// Body of `PUT /chatbot/sessions/{id}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ChatContext>,
}

/// Chat endpoints
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// `POST /chatbot/chat`
    async fn send(&self, request: &ChatRequest) -> Result<ChatReply>;

    /// `GET /chatbot/history/{id}`
    async fn history(&self, session_id: &str) -> Result<Vec<MessageRecord>>;

    /// `GET /chatbot/sessions`
    async fn sessions(&self) -> Result<Vec<ChatSession>>;

    /// `POST /chatbot/sessions`
    async fn create_session(&self, title: &str, context: &ChatContext) -> Result<ChatSession>;

    /// `PUT /chatbot/sessions/{id}`
    async fn update_session(&self, session_id: &str, update: &SessionUpdate) -> Result<ChatSession>;

    /// `DELETE /chatbot/sessions/{id}`
    async fn delete_session(&self, session_id: &str) -> Result<()>;
}

#[async_trait]
impl ChatApi for ApiClient {
    async fn send(&self, request: &ChatRequest) -> Result<ChatReply> {
        self.send_json(Method::POST, &["chatbot", "chat"], request)
            .await
    }

    async fn history(&self, session_id: &str) -> Result<Vec<MessageRecord>> {
        self.get(&["chatbot", "history", session_id]).await
    }

    async fn sessions(&self) -> Result<Vec<ChatSession>> {
        self.get(&["chatbot", "sessions"]).await
    }

    async fn create_session(&self, title: &str, context: &ChatContext) -> Result<ChatSession> {
        self.send_json(
            Method::POST,
            &["chatbot", "sessions"],
            &NewSession { title, context },
        )
        .await
    }

    async fn update_session(&self, session_id: &str, update: &SessionUpdate) -> Result<ChatSession> {
        self.send_json(Method::PUT, &["chatbot", "sessions", session_id], update)
            .await
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.send_empty(Method::DELETE, &["chatbot", "sessions", session_id])
            .await
    }
}
