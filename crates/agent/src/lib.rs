//! The reflexion loop: the heart of Reflexion.
//!
//! The agent follows a **Draft → Execute tools → Revise** cycle:
//!
//! 1. **Draft** an answer with a self-critique and follow-up search queries
//! 2. **Execute tools**: run every follow-up query against the search backend
//! 3. **Revise** the answer using the evidence, with citations
//! 4. **If the revision asks for more queries**: loop back to step 2
//!
//! The loop stops when a revision asks for nothing more or the iteration
//! cap (tool replies in the conversation) is reached.

pub mod controller;
pub mod feedback;
pub mod prompts;
pub mod state;
pub mod steps;
pub mod trace;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use controller::{APOLOGY, LoopRequest, LoopResult, ReflexionAgent, extract_final_answer};
pub use feedback::{DEFAULT_CRITIQUE, RevisionInput};
pub use state::{LoopState, MAX_ITERATIONS, next_state};
pub use steps::{DraftStep, GenerationSettings, RevisionStep, ToolExecutor};
pub use trace::{Phase, StepRecord, extract_trace};

// Re-exported so callers can build a `LoopRequest` without naming tokio-util.
pub use tokio_util::sync::CancellationToken;
