//! System prompts for the draft and revision steps.
//!
//! Both steps share one actor template; only the first instruction differs.

use chrono::{DateTime, Utc};

const DRAFT_INSTRUCTION: &str = "Provide a detailed ~250 word answer.";

const REVISE_INSTRUCTION: &str = "Revise your previous answer using the new information.
    - You should use the previous critique to add important information to your answer.
    - You MUST include numerical citations in your revised answer to ensure it can be verified.
    - Add a \"References\" section to the bottom of your answer (which does not count towards the word limit). In form of:
        - [1] https://example.com
        - [2] https://example.com
    - You should use the previous critique to remove superfluous information from your answer and make SURE it is not more than 250 words.";

fn actor_prompt(persona: &str, now: DateTime<Utc>, first_instruction: &str, tool: &str) -> String {
    format!(
        "You are {persona}.
Current time: {time}

1. {first_instruction}
2. Reflect and critique your answer. Be severe to maximize improvement.
3. Recommend search queries to research information and improve your answer.

Answer the user's question above using the {tool} function.",
        time = now.format("%Y-%m-%dT%H:%M:%SZ"),
    )
}

/// System prompt for the draft step.
pub fn draft_system_prompt(persona: &str, now: DateTime<Utc>) -> String {
    actor_prompt(persona, now, DRAFT_INSTRUCTION, "AnswerQuestion")
}

/// System prompt for the revision step.
pub fn revise_system_prompt(persona: &str, now: DateTime<Utc>) -> String {
    actor_prompt(persona, now, REVISE_INSTRUCTION, "ReviseAnswer")
}
