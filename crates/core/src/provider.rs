//! Provider trait — the abstraction over generation backends.
//!
//! A Provider knows how to send a conversation to an LLM and get a response
//! back. The reflexion steps always force one structured tool call, so the
//! request carries a `tool_choice`; the response keeps tool calls as raw
//! JSON strings and leaves decoding to [`crate::protocol`].
//!
//! Implementations: OpenAI-compatible endpoints (OpenAI, Gemini's OpenAI
//! surface, OpenRouter, Ollama, ...).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::message::Message;

/// Configuration for a generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The model to use (e.g., "gemini-2.0-flash", "gpt-4o")
    pub model: String,

    /// System instructions, sent ahead of the conversation
    pub system: String,

    /// The conversation messages
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Force the model to call this tool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
}

fn default_temperature() -> f32 {
    0.7
}

/// A tool definition sent to the LLM so it knows what tools it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// A tool call as the backend returned it, before decoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawToolCall {
    /// Backend-assigned call ID (may be empty)
    pub id: String,

    /// Name of the tool
    pub name: String,

    /// Arguments as a JSON string
    pub arguments: String,
}

/// A complete response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Free-text content, if any
    #[serde(default)]
    pub content: Option<String>,

    /// Tool calls requested by the model
    #[serde(default)]
    pub tool_calls: Vec<RawToolCall>,

    /// Token usage statistics
    #[serde(default)]
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The core Provider trait.
///
/// The draft and revision steps call `complete()` without knowing which
/// backend answers.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "gemini", "openai").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<GenerationResponse, GenerationError>;

    /// Health check — can we reach the provider?
    async fn health_check(&self) -> std::result::Result<bool, GenerationError> {
        Ok(true)
    }
}
