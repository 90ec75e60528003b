//! Message and Conversation domain types.
//!
//! These are the value objects that flow through the reflexion loop:
//! the user's question enters as a `user` message, the draft and every
//! revision arrive as `assistant` messages carrying structured tool calls,
//! and evidence comes back as `tool` messages answering those calls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::Error;
use crate::protocol::ToolCallRequest;

/// Unique identifier for a conversation (one loop run).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The generation backend
    Assistant,
    /// Evidence lookup result
    Tool,
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The free-text content, if any
    #[serde(default)]
    pub content: Option<String>,

    /// Structured tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn with_role(role: Role, content: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, Some(content.into()))
    }

    /// Create a new assistant message.
    ///
    /// Empty content is stored as `None`, matching what backends send when
    /// the whole answer lives in a tool call.
    pub fn assistant(content: Option<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        let mut msg = Self::with_role(Role::Assistant, content.filter(|c| !c.trim().is_empty()));
        msg.tool_calls = tool_calls;
        msg
    }

    /// Create a tool result message.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut msg = Self::with_role(Role::Tool, Some(content.into()));
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }

    /// Non-empty free text of this message.
    pub fn text(&self) -> Option<&str> {
        self.content.as_deref().filter(|c| !c.trim().is_empty())
    }
}

/// A conversation is the ordered, append-only message log of one loop run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation ID
    pub id: ConversationId,

    /// Ordered messages
    pub messages: Vec<Message>,

    /// When this conversation was created
    pub created_at: DateTime<Utc>,

    /// When the last message was added
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new empty conversation.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Add a message to the conversation.
    pub fn push(&mut self, message: Message) {
        self.updated_at = Utc::now();
        self.messages.push(message);
    }

    /// Number of `tool` messages so far — the loop's iteration counter.
    pub fn tool_message_count(&self) -> usize {
        self.messages.iter().filter(|m| m.role == Role::Tool).count()
    }

    /// The most recent assistant message.
    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::Assistant)
    }

    /// The question that started this conversation.
    pub fn user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == Role::User)
            .and_then(|m| m.text())
    }

    /// Tool calls on the latest assistant message that no later `tool`
    /// message answers yet, in emission order.
    pub fn pending_tool_calls(&self) -> Vec<&ToolCallRequest> {
        let Some(pos) = self.messages.iter().rposition(|m| m.role == Role::Assistant) else {
            return Vec::new();
        };

        let answered: HashSet<&str> = self.messages[pos + 1..]
            .iter()
            .filter_map(|m| m.tool_call_id.as_deref())
            .collect();

        self.messages[pos]
            .tool_calls
            .iter()
            .filter(|tc| !answered.contains(tc.id.as_str()))
            .collect()
    }

    /// Check the tool-reply invariant: every `tool` message answers an
    /// outstanding call emitted by an earlier assistant message, once.
    pub fn validate(&self) -> Result<(), Error> {
        let mut outstanding: HashSet<&str> = HashSet::new();

        for (index, message) in self.messages.iter().enumerate() {
            match message.role {
                Role::Assistant => {
                    for tc in &message.tool_calls {
                        if !outstanding.insert(tc.id.as_str()) {
                            return Err(Error::Internal(format!(
                                "duplicate tool call id '{}' at message {index}",
                                tc.id
                            )));
                        }
                    }
                }
                Role::Tool => {
                    let Some(call_id) = message.tool_call_id.as_deref() else {
                        return Err(Error::Internal(format!(
                            "tool message {index} has no tool_call_id"
                        )));
                    };
                    if !outstanding.remove(call_id) {
                        return Err(Error::Internal(format!(
                            "tool message {index} answers unknown or already answered call '{call_id}'"
                        )));
                    }
                }
                Role::User => {}
            }
        }

        Ok(())
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{AnswerQuestion, Reflection, StructuredCall};

    fn call(id: &str) -> ToolCallRequest {
        ToolCallRequest {
            id: id.into(),
            call: StructuredCall::AnswerQuestion(AnswerQuestion {
                answer: "draft".into(),
                reflection: Reflection::default(),
                search_queries: vec!["q".into()],
            }),
        }
    }

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello, agent!");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.text(), Some("Hello, agent!"));
        assert!(msg.tool_calls.is_empty());
    }

    #[test]
    fn blank_assistant_content_is_none() {
        let msg = Message::assistant(Some("   ".into()), vec![call("c1")]);
        assert!(msg.content.is_none());
        assert_eq!(msg.tool_calls.len(), 1);
    }

    #[test]
    fn conversation_tracks_updates() {
        let mut conv = Conversation::new();
        let created = conv.created_at;

        conv.push(Message::user("First message"));
        assert_eq!(conv.messages.len(), 1);
        assert!(conv.updated_at >= created);
        assert_eq!(conv.user_text(), Some("First message"));
    }

    #[test]
    fn pending_calls_shrink_as_replies_arrive() {
        let mut conv = Conversation::new();
        conv.push(Message::user("q"));
        conv.push(Message::assistant(None, vec![call("c1"), call("c2")]));
        assert_eq!(conv.pending_tool_calls().len(), 2);

        conv.push(Message::tool_result("c1", "{}"));
        let pending = conv.pending_tool_calls();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "c2");
        assert_eq!(conv.tool_message_count(), 1);
    }

    #[test]
    fn pending_calls_only_look_at_latest_assistant() {
        let mut conv = Conversation::new();
        conv.push(Message::user("q"));
        conv.push(Message::assistant(None, vec![call("c1")]));
        conv.push(Message::assistant(Some("done".into()), vec![]));
        assert!(conv.pending_tool_calls().is_empty());
    }

    #[test]
    fn validate_accepts_well_formed_log() {
        let mut conv = Conversation::new();
        conv.push(Message::user("q"));
        conv.push(Message::assistant(None, vec![call("c1")]));
        conv.push(Message::tool_result("c1", "{}"));
        conv.push(Message::assistant(None, vec![call("c2")]));
        conv.push(Message::tool_result("c2", "{}"));
        assert!(conv.validate().is_ok());
    }

    #[test]
    fn validate_rejects_orphan_tool_reply() {
        let mut conv = Conversation::new();
        conv.push(Message::user("q"));
        conv.push(Message::tool_result("nope", "{}"));
        assert!(conv.validate().is_err());
    }

    #[test]
    fn validate_rejects_double_answer() {
        let mut conv = Conversation::new();
        conv.push(Message::assistant(None, vec![call("c1")]));
        conv.push(Message::tool_result("c1", "{}"));
        conv.push(Message::tool_result("c1", "{}"));
        assert!(conv.validate().is_err());
    }

    #[test]
    fn message_serialization_roundtrip() {
        let msg = Message::assistant(None, vec![call("c1")]);
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
