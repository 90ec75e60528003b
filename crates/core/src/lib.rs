//! # Reflexion Core
//!
//! Domain types, traits, and error definitions for the Reflexion research
//! agent. This crate has **zero framework dependencies** — it defines the
//! domain model that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Each external capability is a trait here. Implementations live in their
//! own crates:
//! - [`Provider`] — the generation backend (`reflexion-providers`)
//! - [`EvidenceLookup`] — the search backend (`reflexion-tools`)
//! - [`SessionStore`] — transcript storage (`reflexion-sessions`)
//!
//! The reflexion loop itself (`reflexion-agent`) only ever sees these traits,
//! so tests swap in scripted stubs without touching the network.

pub mod error;
pub mod event;
pub mod lookup;
pub mod message;
pub mod protocol;
pub mod provider;
pub mod session;

// Re-export key types at crate root for ergonomics
pub use error::{Error, GenerationError, LookupError, Result, SessionError};
pub use event::{DomainEvent, EventBus};
pub use lookup::{EvidenceLookup, SearchHit};
pub use message::{Conversation, ConversationId, Message, Role};
pub use protocol::{AnswerQuestion, Capability, Reflection, ReviseAnswer, StructuredCall, ToolCallRequest};
pub use provider::{GenerationRequest, GenerationResponse, Provider, RawToolCall, ToolDefinition, Usage};
pub use session::{ChatEntry, Sender, Session, SessionStore, SessionSummary};
