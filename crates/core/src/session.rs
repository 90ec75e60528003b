//! Session store trait — chat transcripts kept by the surrounding service.
//!
//! The reflexion loop never touches sessions. The HTTP layer records the
//! user's message and the final answer of each run here, and reads them
//! back for listing and transcript export.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Who wrote a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

/// One line of a chat transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEntry {
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,

    /// Tool rounds the loop used to produce this answer (AI entries only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterations: Option<usize>,
}

impl ChatEntry {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::User,
            timestamp: Utc::now(),
            iterations: None,
        }
    }

    pub fn ai(text: impl Into<String>, iterations: usize) -> Self {
        Self {
            text: text.into(),
            sender: Sender::Ai,
            timestamp: Utc::now(),
            iterations: Some(iterations),
        }
    }
}

/// A chat session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub messages: Vec<ChatEntry>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            messages: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// Listing view of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
}

/// The session store trait.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Backend name (e.g., "in_memory").
    fn name(&self) -> &str;

    /// Fetch a session by ID.
    async fn get(&self, id: &str) -> Result<Option<Session>, SessionError>;

    /// Fetch a session, creating an empty one if it does not exist yet.
    async fn get_or_create(&self, id: &str) -> Result<Session, SessionError>;

    /// Append an entry, creating the session if needed.
    async fn append(&self, id: &str, entry: ChatEntry) -> Result<(), SessionError>;

    /// Summaries of all sessions.
    async fn list(&self) -> Result<Vec<SessionSummary>, SessionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_constructors() {
        let user = ChatEntry::user("hi");
        assert_eq!(user.sender, Sender::User);
        assert!(user.iterations.is_none());

        let ai = ChatEntry::ai("hello", 2);
        assert_eq!(ai.sender, Sender::Ai);
        assert_eq!(ai.iterations, Some(2));
    }

    #[test]
    fn sender_serializes_lowercase() {
        let json = serde_json::to_string(&ChatEntry::ai("x", 1)).unwrap();
        assert!(json.contains(r#""sender":"ai""#));
    }
}
