//! The three steps the loop controller sequences.
//!
//! - [`DraftStep`] asks the backend for a first `AnswerQuestion`
//! - [`ToolExecutor`] answers pending calls with evidence lookups
//! - [`RevisionStep`] asks for a `ReviseAnswer` over the whole conversation
//!
//! None of them knows about the iteration cap or cancellation; that is the
//! controller's job.

pub mod draft;
pub mod revise;
pub mod tools;

pub use draft::DraftStep;
pub use revise::RevisionStep;
pub use tools::ToolExecutor;

use std::collections::HashSet;
use std::sync::Arc;

use reflexion_core::error::GenerationError;
use reflexion_core::message::Message;
use reflexion_core::protocol::{Capability, ToolCallRequest};
use reflexion_core::provider::{GenerationRequest, GenerationResponse, Provider};
use tracing::{debug, warn};

/// Backend and sampling settings shared by the generating steps.
#[derive(Clone)]
pub struct GenerationSettings {
    pub provider: Arc<dyn Provider>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub persona: String,
}

impl GenerationSettings {
    /// Send one request that forces `capability` and decode the reply into
    /// an assistant message.
    ///
    /// Only the first call of the reply is kept; the forced tool choice
    /// allows one call per response, so each round adds one tool reply.
    ///
    /// `taken_ids` are call IDs already present in the conversation; clashing
    /// IDs in the reply are replaced.
    pub(crate) async fn generate(
        &self,
        capability: Capability,
        system: String,
        messages: Vec<Message>,
        taken_ids: &HashSet<String>,
    ) -> Result<(Message, GenerationResponse), GenerationError> {
        let request = GenerationRequest {
            model: self.model.clone(),
            system,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: vec![capability.definition()],
            tool_choice: Some(capability.name().to_string()),
        };

        let response = self.provider.complete(request).await?;
        if response.tool_calls.len() > 1 {
            warn!(
                provider = self.provider.name(),
                capability = %capability,
                dropped = response.tool_calls.len() - 1,
                "Extra tool calls in response, keeping the first"
            );
        }
        let first = &response.tool_calls[..response.tool_calls.len().min(1)];
        let calls = ToolCallRequest::decode_all(first, taken_ids)?;

        debug!(
            provider = self.provider.name(),
            capability = %capability,
            tool_calls = calls.len(),
            has_content = response.content.is_some(),
            "Structured response decoded"
        );

        let message = Message::assistant(response.content.clone(), calls);
        Ok((message, response))
    }
}

/// IDs of every tool call emitted so far.
pub(crate) fn taken_call_ids(messages: &[Message]) -> HashSet<String> {
    messages
        .iter()
        .flat_map(|m| m.tool_calls.iter().map(|tc| tc.id.clone()))
        .collect()
}
