//! Loop states and the pure transition function.

use reflexion_core::message::Conversation;
use serde::{Deserialize, Serialize};

/// Default number of tool-execution rounds before the loop stops.
pub const MAX_ITERATIONS: usize = 3;

/// Where the reflexion loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Drafting,
    ExecutingTools,
    Revising,
    Done,
}

impl LoopState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopState::Drafting => "drafting",
            LoopState::ExecutingTools => "executing_tools",
            LoopState::Revising => "revising",
            LoopState::Done => "done",
        }
    }
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compute the state that follows `state`, given the conversation as it
/// stands after `state`'s step has run.
///
/// Drafting and tool execution always advance. After a revision the loop
/// stops once `max_iterations` tool replies exist; below the cap it runs
/// another tool round whenever the latest assistant message still has an
/// unanswered call.
pub fn next_state(state: LoopState, conversation: &Conversation, max_iterations: usize) -> LoopState {
    match state {
        LoopState::Drafting => LoopState::ExecutingTools,
        LoopState::ExecutingTools => LoopState::Revising,
        LoopState::Revising => {
            if conversation.tool_message_count() >= max_iterations {
                LoopState::Done
            } else if !conversation.pending_tool_calls().is_empty() {
                LoopState::ExecutingTools
            } else {
                LoopState::Done
            }
        }
        LoopState::Done => LoopState::Done,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reflexion_core::message::Message;
    use reflexion_core::protocol::{ReviseAnswer, StructuredCall, ToolCallRequest};

    fn revise_call(id: &str) -> ToolCallRequest {
        ToolCallRequest {
            id: id.into(),
            call: StructuredCall::ReviseAnswer(ReviseAnswer {
                answer: "revised".into(),
                reflection: Default::default(),
                search_queries: vec!["more".into()],
                references: vec![],
            }),
        }
    }

    /// A conversation with `rounds` answered tool calls, ending in a
    /// revision that itself asks for another round when `pending` is set.
    fn conversation(rounds: usize, pending: bool) -> Conversation {
        let mut conv = Conversation::new();
        conv.push(Message::user("q"));
        for i in 0..rounds {
            let id = format!("call_{i}");
            conv.push(Message::assistant(None, vec![revise_call(&id)]));
            conv.push(Message::tool_result(&id, "{}"));
        }
        let last = if pending { vec![revise_call("call_last")] } else { vec![] };
        conv.push(Message::assistant(Some("done".into()), last));
        conv
    }

    #[test]
    fn unconditional_edges() {
        let conv = conversation(0, false);
        assert_eq!(next_state(LoopState::Drafting, &conv, 3), LoopState::ExecutingTools);
        assert_eq!(next_state(LoopState::ExecutingTools, &conv, 3), LoopState::Revising);
        assert_eq!(next_state(LoopState::Done, &conv, 3), LoopState::Done);
    }

    #[test]
    fn revision_with_pending_calls_continues_below_cap() {
        assert_eq!(
            next_state(LoopState::Revising, &conversation(1, true), 3),
            LoopState::ExecutingTools
        );
    }

    #[test]
    fn revision_without_calls_finishes() {
        assert_eq!(next_state(LoopState::Revising, &conversation(1, false), 3), LoopState::Done);
    }

    #[test]
    fn revision_without_queries_still_continues() {
        let mut conv = conversation(1, false);
        let mut call = revise_call("call_quiet");
        if let StructuredCall::ReviseAnswer(r) = &mut call.call {
            r.search_queries.clear();
        }
        conv.push(Message::assistant(None, vec![call]));
        assert_eq!(next_state(LoopState::Revising, &conv, 3), LoopState::ExecutingTools);
    }

    #[test]
    fn cap_is_inclusive() {
        assert_eq!(next_state(LoopState::Revising, &conversation(3, true), 3), LoopState::Done);
        assert_eq!(
            next_state(LoopState::Revising, &conversation(2, true), 3),
            LoopState::ExecutingTools
        );
    }

    #[test]
    fn respects_custom_cap() {
        assert_eq!(next_state(LoopState::Revising, &conversation(1, true), 1), LoopState::Done);
    }

    #[test]
    fn state_names() {
        assert_eq!(LoopState::ExecutingTools.to_string(), "executing_tools");
    }
}
