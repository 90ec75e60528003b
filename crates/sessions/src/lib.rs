//! Session storage for Reflexion.
//!
//! Sessions hold the chat transcript the HTTP layer records around each
//! reflexion run. The in-memory backend is the only one shipped; sessions
//! do not survive a restart.

pub mod export;
pub mod in_memory;

pub use export::{render_transcript, transcript_filename};
pub use in_memory::InMemorySessionStore;
