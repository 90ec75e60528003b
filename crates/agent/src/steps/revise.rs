//! Revision step: a new structured answer over the accumulated conversation.

use chrono::Utc;
use reflexion_core::error::GenerationError;
use reflexion_core::message::{Conversation, Message};
use reflexion_core::protocol::Capability;
use reflexion_core::provider::GenerationResponse;

use super::{GenerationSettings, taken_call_ids};
use crate::prompts::revise_system_prompt;

pub struct RevisionStep {
    settings: GenerationSettings,
}

impl RevisionStep {
    pub fn new(settings: GenerationSettings) -> Self {
        Self { settings }
    }

    /// Produce a revised assistant message from the whole conversation.
    pub async fn revise(
        &self,
        conversation: &Conversation,
    ) -> Result<(Message, GenerationResponse), GenerationError> {
        let system = revise_system_prompt(&self.settings.persona, Utc::now());
        let taken = taken_call_ids(&conversation.messages);
        self.settings
            .generate(
                Capability::ReviseAnswer,
                system,
                conversation.messages.clone(),
                &taken,
            )
            .await
    }
}
