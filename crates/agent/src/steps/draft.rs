//! Draft step: the first structured answer.

use chrono::Utc;
use reflexion_core::error::GenerationError;
use reflexion_core::message::Message;
use reflexion_core::protocol::Capability;
use reflexion_core::provider::GenerationResponse;
use std::collections::HashSet;

use super::GenerationSettings;
use crate::prompts::draft_system_prompt;

pub struct DraftStep {
    settings: GenerationSettings,
}

impl DraftStep {
    pub fn new(settings: GenerationSettings) -> Self {
        Self { settings }
    }

    /// Produce the draft assistant message for `user_text`.
    ///
    /// Generation errors are returned as-is; there are no retries here.
    pub async fn draft(
        &self,
        user_text: &str,
    ) -> Result<(Message, GenerationResponse), GenerationError> {
        let system = draft_system_prompt(&self.settings.persona, Utc::now());
        self.settings
            .generate(
                Capability::AnswerQuestion,
                system,
                vec![Message::user(user_text)],
                &HashSet::new(),
            )
            .await
    }
}
