//! Generation provider implementations for Reflexion.
//!
//! All providers implement the `reflexion_core::Provider` trait.
//! The router builds the configured one.

pub mod openai_compat;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use router::build_from_config;
