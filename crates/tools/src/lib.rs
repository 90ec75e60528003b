//! Evidence lookup backends for Reflexion.
//!
//! Each backend implements `reflexion_core::EvidenceLookup`:
//! - [`TavilySearch`] calls the Tavily web search API
//! - [`StubSearch`] returns deterministic offline results

pub mod stub;
pub mod tavily;

use std::sync::Arc;

use reflexion_config::SearchConfig;
use reflexion_core::lookup::EvidenceLookup;

pub use stub::StubSearch;
pub use tavily::TavilySearch;

/// Build the configured search backend.
///
/// Unknown provider names fall back to the offline stub with a warning.
pub fn build_from_config(config: &SearchConfig) -> Arc<dyn EvidenceLookup> {
    match config.provider.as_str() {
        "tavily" => Arc::new(TavilySearch::new(
            config.api_key.clone().unwrap_or_default(),
            config.max_results,
            config.timeout(),
        )),
        "stub" => Arc::new(StubSearch::new(config.max_results)),
        other => {
            tracing::warn!(provider = other, "Unknown search provider, using offline stub");
            Arc::new(StubSearch::new(config.max_results))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_configured_backend() {
        let tavily = build_from_config(&SearchConfig::default());
        assert_eq!(tavily.name(), "tavily");

        let stub = build_from_config(&SearchConfig {
            provider: "stub".into(),
            ..Default::default()
        });
        assert_eq!(stub.name(), "stub");
    }

    #[test]
    fn unknown_backend_falls_back_to_stub() {
        let lookup = build_from_config(&SearchConfig {
            provider: "bing".into(),
            ..Default::default()
        });
        assert_eq!(lookup.name(), "stub");
    }
}
