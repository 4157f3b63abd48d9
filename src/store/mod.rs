//! Chat persistence: session and message records behind store traits.
//!
//! The wire casing is camelCase throughout, matching the REST payloads the
//! browser client consumes.

mod memory;

pub use memory::MemoryStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chat session (one conversation thread).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Message author role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// An inline image carried by a user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAttachment {
    pub base64: String,
    pub mime_type: String,
}

/// A persisted chat message.
///
/// `order_index` values are contiguous within a session, assigned at insert
/// time as one past the current maximum, and never reused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub session_id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<ImageAttachment>>,
    pub order_index: u32,
    pub created_at: DateTime<Utc>,
}

/// Payload for creating a session. Doubles as the `POST /sessions` body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    /// Client-chosen id; empty or absent means server-generated.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    pub model: String,
}

/// Payload for appending a message. Doubles as the
/// `POST /chat/{sessionId}/messages` body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub reasoning_content: Option<String>,
    #[serde(default)]
    pub images: Option<Vec<ImageAttachment>>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("session '{0}' not found")]
    SessionNotFound(String),
    #[error("session '{0}' already exists")]
    DuplicateSession(String),
}

/// Session CRUD contract.
pub trait SessionStore: Send + Sync {
    /// All sessions, most recently updated first.
    fn list_sessions(&self) -> Vec<ChatSession>;

    /// Create a session. A client-supplied id that already exists is a
    /// [`StoreError::DuplicateSession`].
    fn create_session(&self, new: NewSession) -> Result<ChatSession, StoreError>;

    /// Delete a session and every message it owns.
    fn delete_session(&self, id: &str) -> Result<(), StoreError>;
}

/// Message persistence contract.
pub trait MessageStore: Send + Sync {
    /// Messages of one session in `order_index` order. An unknown session
    /// yields an empty list.
    fn list_messages(&self, session_id: &str) -> Vec<Message>;

    /// Append a message, assigning the next `order_index` and touching the
    /// session's `updated_at`.
    fn create_message(&self, session_id: &str, new: NewMessage) -> Result<Message, StoreError>;
}
