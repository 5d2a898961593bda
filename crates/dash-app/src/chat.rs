//! Chat sessions with the financial assistant
//!
//! Exactly one session is active at any time: either one the backend knows
//! about, or a draft that gets an id from the backend on its first message.

use crate::auth::AuthHandle;
use crate::error::{Error, Result};
use crate::validation::ValidationErrors;
use chrono::{DateTime, Utc};
use dash_api::{ChatApi, ChatContext, ChatRequest, ChatSession, MessageRecord, SessionUpdate};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const WELCOME_MESSAGE: &str = "Hi there! I'm your financial assistant. Ask me anything about stocks, market data, or financial analysis.";
pub const REPLY_FAILED: &str =
    "Sorry, I encountered an error processing your request. Please try again.";
pub const DEFAULT_SESSION_TITLE: &str = "New Conversation";

/// Most symbols that can be attached to a conversation
pub const MAX_CONTEXT_SYMBOLS: usize = 3;

/// The conversation currently shown
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ActiveSession {
    /// Not saved yet; the backend assigns an id on the first message
    #[default]
    Draft,
    Persisted(String),
}

impl ActiveSession {
    /// Backend id, if the session has one
    pub fn id(&self) -> Option<&str> {
        match self {
            ActiveSession::Draft => None,
            ActiveSession::Persisted(id) => Some(id),
        }
    }

    pub fn is_draft(&self) -> bool {
        matches!(self, ActiveSession::Draft)
    }
}

/// One entry in the transcript
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: String,
    pub content: String,
    pub is_user: bool,
    pub timestamp: DateTime<Utc>,
    /// Stands in for a reply that failed
    pub is_error: bool,
}

impl ChatMessage {
    pub fn welcome() -> Self {
        Self {
            id: "welcome".to_string(),
            content: WELCOME_MESSAGE.to_string(),
            is_user: false,
            timestamp: Utc::now(),
            is_error: false,
        }
    }

    fn from_user(text: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: text.to_string(),
            is_user: true,
            timestamp: Utc::now(),
            is_error: false,
        }
    }

    fn from_assistant(text: &str, at: Option<DateTime<Utc>>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: text.to_string(),
            is_user: false,
            timestamp: at.unwrap_or_else(Utc::now),
            is_error: false,
        }
    }

    fn failed_reply() -> Self {
        Self {
            is_error: true,
            ..Self::from_assistant(REPLY_FAILED, None)
        }
    }
}

impl From<MessageRecord> for ChatMessage {
    fn from(record: MessageRecord) -> Self {
        Self {
            id: record.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            content: record.content,
            is_user: record.is_user,
            timestamp: record.timestamp.unwrap_or_else(Utc::now),
            is_error: false,
        }
    }
}

/// Published chat state
#[derive(Debug, Clone, PartialEq)]
pub struct ChatState {
    pub sessions: Vec<ChatSession>,
    pub active: ActiveSession,
    pub messages: Vec<ChatMessage>,
    /// Symbols attached to outgoing messages, at most three
    pub context_symbols: Vec<String>,
    /// A message or transcript request is in flight
    pub loading: bool,
    pub loading_sessions: bool,
}

impl Default for ChatState {
    fn default() -> Self {
        Self {
            sessions: Vec::new(),
            active: ActiveSession::Draft,
            messages: vec![ChatMessage::welcome()],
            context_symbols: Vec::new(),
            loading: false,
            loading_sessions: false,
        }
    }
}

/// Chat session coordinator
pub struct ChatService {
    api: Arc<dyn ChatApi>,
    auth: AuthHandle,
    state: watch::Sender<ChatState>,
    /// Bumped whenever the transcript is swapped for another one
    transcript: AtomicU64,
}

impl ChatService {
    pub fn new(api: Arc<dyn ChatApi>, auth: AuthHandle) -> Self {
        let (state, _) = watch::channel(ChatState::default());
        Self {
            api,
            auth,
            state,
            transcript: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> ChatState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ChatState> {
        self.state.subscribe()
    }

    pub fn active(&self) -> ActiveSession {
        self.state.borrow().active.clone()
    }

    /// Fetch the user's sessions; logged-out users have none
    pub async fn list_sessions(&self) -> Vec<ChatSession> {
        if !self.auth.is_authenticated() {
            return Vec::new();
        }

        self.state.send_modify(|state| state.loading_sessions = true);
        match self.api.sessions().await {
            Ok(sessions) => {
                debug!(count = sessions.len(), "Chat sessions loaded");
                self.state.send_modify(|state| {
                    state.sessions.clone_from(&sessions);
                    state.loading_sessions = false;
                });
                sessions
            }
            Err(e) => {
                warn!("Failed to load chat sessions: {}", e);
                let mut kept = Vec::new();
                self.state.send_modify(|state| {
                    state.loading_sessions = false;
                    kept.clone_from(&state.sessions);
                });
                kept
            }
        }
    }

    /// Start a new conversation and make it active
    ///
    /// Logged-in users get a session from the backend; otherwise a draft is
    /// started locally.
    pub async fn create_session(&self, title: Option<&str>) -> Result<ActiveSession> {
        let active = if self.auth.is_authenticated() {
            let title = title
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .unwrap_or(DEFAULT_SESSION_TITLE);

            self.state.send_modify(|state| state.loading = true);
            let created = self.api.create_session(title, &ChatContext::default()).await;
            self.state.send_modify(|state| state.loading = false);

            let session = created.map_err(|e| {
                warn!("Failed to create chat session: {}", e);
                Error::request("Failed to start a new conversation", e)
            })?;
            info!(session = %session.id, "Chat session created");
            ActiveSession::Persisted(session.id)
        } else {
            ActiveSession::Draft
        };

        self.replace_transcript(active.clone(), vec![ChatMessage::welcome()]);
        self.list_sessions().await;
        Ok(active)
    }

    /// Load a session's transcript and make it active
    pub async fn switch_session(&self, session_id: &str) -> Result<()> {
        self.state.send_modify(|state| state.loading = true);
        let history = self.api.history(session_id).await;
        self.state.send_modify(|state| state.loading = false);

        let records = history.map_err(|e| {
            warn!(session = %session_id, "Failed to load chat history: {}", e);
            Error::request("Failed to load conversation", e)
        })?;

        let messages = records.into_iter().map(ChatMessage::from).collect();
        self.replace_transcript(ActiveSession::Persisted(session_id.to_string()), messages);
        debug!(session = %session_id, "Switched chat session");
        Ok(())
    }

    /// Send a message and append the reply
    ///
    /// Returns the appended reply, or `None` for a blank message. A failed
    /// reply is appended as an error entry rather than returned as an error.
    pub async fn send_message(&self, text: &str) -> Option<ChatMessage> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let mut epoch = 0;
        let mut session_id = None;
        let mut context = None;
        self.state.send_modify(|state| {
            epoch = self.transcript.load(Ordering::SeqCst);
            state.messages.push(ChatMessage::from_user(text));
            state.loading = true;
            session_id = state.active.id().map(str::to_string);
            if !state.context_symbols.is_empty() {
                context = Some(ChatContext::with_symbols(state.context_symbols.clone()));
            }
        });

        let request = ChatRequest {
            message: text.to_string(),
            session_id,
            context,
        };
        let result = self.api.send(&request).await;

        let reply = match &result {
            Ok(reply) => ChatMessage::from_assistant(&reply.message, reply.created_at),
            Err(e) => {
                warn!("Chat request failed: {}", e);
                ChatMessage::failed_reply()
            }
        };

        let mut adopted = None;
        self.state.send_modify(|state| {
            state.loading = false;
            if self.transcript.load(Ordering::SeqCst) != epoch {
                return;
            }
            if let Ok(response) = &result {
                if state.active.is_draft() && !response.session_id.is_empty() {
                    state.active = ActiveSession::Persisted(response.session_id.clone());
                    adopted = Some(response.session_id.clone());
                }
            }
            state.messages.push(reply.clone());
        });

        if let Some(id) = adopted {
            info!(session = %id, "Draft conversation saved");
            self.list_sessions().await;
        }

        Some(reply)
    }

    /// Delete a session; deleting the active one starts a fresh conversation
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.api.delete_session(session_id).await.map_err(|e| {
            warn!(session = %session_id, "Failed to delete chat session: {}", e);
            Error::request("Failed to delete conversation", e)
        })?;

        let was_active = self.state.borrow().active.id() == Some(session_id);
        self.state
            .send_modify(|state| state.sessions.retain(|session| session.id != session_id));

        if was_active {
            if let Err(e) = self.create_session(None).await {
                warn!("Falling back to a draft conversation: {}", e);
                self.replace_transcript(ActiveSession::Draft, vec![ChatMessage::welcome()]);
            }
        }

        self.list_sessions().await;
        Ok(())
    }

    /// Give a session a new title
    pub async fn rename_session(&self, session_id: &str, title: &str) -> Result<ChatSession> {
        let title = title.trim();
        if title.is_empty() {
            let mut errors = ValidationErrors::default();
            errors.add("title", "Title is required");
            return Err(Error::Validation(errors));
        }

        let update = SessionUpdate {
            title: Some(title.to_string()),
            context: None,
        };
        let session = self
            .api
            .update_session(session_id, &update)
            .await
            .map_err(|e| Error::request("Failed to rename conversation", e))?;

        self.state.send_modify(|state| {
            if let Some(existing) = state.sessions.iter_mut().find(|s| s.id == session.id) {
                *existing = session.clone();
            }
        });
        Ok(session)
    }

    /// Attach or detach a symbol; returns whether it is now attached
    pub fn toggle_context_symbol(&self, symbol: &str) -> bool {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return false;
        }

        let mut selected = false;
        self.state.send_if_modified(|state| {
            if let Some(pos) = state.context_symbols.iter().position(|s| *s == symbol) {
                state.context_symbols.remove(pos);
                true
            } else if state.context_symbols.len() < MAX_CONTEXT_SYMBOLS {
                state.context_symbols.push(symbol.clone());
                selected = true;
                true
            } else {
                false
            }
        });
        selected
    }

    /// Attach `symbol` without toggling; false only when the cap is reached
    pub fn attach_context_symbol(&self, symbol: &str) -> bool {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return false;
        }

        let mut attached = true;
        self.state.send_if_modified(|state| {
            if state.context_symbols.contains(&symbol) {
                false
            } else if state.context_symbols.len() < MAX_CONTEXT_SYMBOLS {
                state.context_symbols.push(symbol.clone());
                true
            } else {
                attached = false;
                false
            }
        });
        attached
    }

    pub fn context_symbols(&self) -> Vec<String> {
        self.state.borrow().context_symbols.clone()
    }

    fn replace_transcript(&self, active: ActiveSession, messages: Vec<ChatMessage>) {
        self.state.send_modify(|state| {
            self.transcript.fetch_add(1, Ordering::SeqCst);
            state.active = active;
            state.messages = messages;
        });
    }
}
