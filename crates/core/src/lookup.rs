//! Evidence lookup trait — the abstraction over search backends.
//!
//! The tool-execution step issues one `search()` per follow-up query the
//! model asked for. Failures are per query; the loop turns them into
//! placeholders instead of aborting.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LookupError;

/// A single search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

/// The core evidence lookup trait.
#[async_trait]
pub trait EvidenceLookup: Send + Sync {
    /// The backend name (e.g., "tavily", "stub").
    fn name(&self) -> &str;

    /// Run one query and return a bounded list of results.
    async fn search(&self, query: &str) -> std::result::Result<Vec<SearchHit>, LookupError>;
}
