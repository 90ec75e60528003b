//! User feedback parsing for the `/revise` flow.
//!
//! A combined string like `"Tell me about X\nCritique: too vague"` is split
//! on the first `Critique:` into the original question and the critique,
//! then turned into a fresh prompt for a new loop run.

use serde::{Deserialize, Serialize};

pub const CRITIQUE_DELIMITER: &str = "Critique:";

/// Used when the input carries no `Critique:` section.
pub const DEFAULT_CRITIQUE: &str = "Please improve and enhance the response";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionInput {
    pub original: String,
    pub critique: String,
}

impl RevisionInput {
    pub fn parse(input: &str) -> Self {
        match input.split_once(CRITIQUE_DELIMITER) {
            Some((original, critique)) => Self {
                original: original.trim().to_string(),
                critique: critique.trim().to_string(),
            },
            None => Self {
                original: input.trim().to_string(),
                critique: DEFAULT_CRITIQUE.to_string(),
            },
        }
    }

    /// The prompt sent through the loop in place of the user's question.
    pub fn to_prompt(&self) -> String {
        format!(
            "Original query: {}\n\nUser feedback for improvement: {}\n\nPlease revise your previous analysis based on this feedback, maintaining the comprehensive format but addressing the specific concerns raised.",
            self.original, self.critique
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_delimiter() {
        let input = RevisionInput::parse("Tell me about X\nCritique: too vague");
        assert_eq!(input.original, "Tell me about X");
        assert_eq!(input.critique, "too vague");
    }

    #[test]
    fn missing_delimiter_uses_default() {
        let input = RevisionInput::parse("Tell me about X");
        assert_eq!(input.original, "Tell me about X");
        assert_eq!(input.critique, DEFAULT_CRITIQUE);
    }

    #[test]
    fn only_first_delimiter_splits() {
        let input = RevisionInput::parse("Q Critique: a Critique: b");
        assert_eq!(input.original, "Q");
        assert_eq!(input.critique, "a Critique: b");
    }

    #[test]
    fn prompt_is_exact() {
        let prompt = RevisionInput::parse("Tell me about X\nCritique: too vague").to_prompt();
        assert_eq!(
            prompt,
            "Original query: Tell me about X\n\nUser feedback for improvement: too vague\n\nPlease revise your previous analysis based on this feedback, maintaining the comprehensive format but addressing the specific concerns raised."
        );
    }
}
