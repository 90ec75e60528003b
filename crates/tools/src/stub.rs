//! Offline search backend that returns deterministic mock results.
//!
//! Lets the reflexion loop run end-to-end without network access or a
//! search API key (`search.provider = "stub"`).

use async_trait::async_trait;
use reflexion_core::error::LookupError;
use reflexion_core::lookup::{EvidenceLookup, SearchHit};

pub struct StubSearch {
    max_results: usize,
}

impl StubSearch {
    pub fn new(max_results: usize) -> Self {
        Self {
            max_results: max_results.clamp(1, 10),
        }
    }
}

impl Default for StubSearch {
    fn default() -> Self {
        Self::new(3)
    }
}

#[async_trait]
impl EvidenceLookup for StubSearch {
    fn name(&self) -> &str {
        "stub"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, LookupError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(LookupError::InvalidQuery("empty query".into()));
        }
        Ok(generate_mock_results(query, self.max_results))
    }
}

fn hit(title: &str, url: &str, snippet: &str) -> SearchHit {
    SearchHit {
        title: title.into(),
        url: url.into(),
        snippet: snippet.into(),
    }
}

fn generate_mock_results(query: &str, count: usize) -> Vec<SearchHit> {
    let q = query.to_lowercase();

    // Context-aware results for a few common topics
    let templates: [(&str, Vec<SearchHit>); 2] = [
        ("rust", vec![
            hit(
                "The Rust Programming Language",
                "https://doc.rust-lang.org/book/",
                "Rust is a systems programming language focused on safety, speed, and concurrency.",
            ),
            hit(
                "Rust by Example",
                "https://doc.rust-lang.org/rust-by-example/",
                "A collection of runnable examples that illustrate Rust concepts and standard library usage.",
            ),
            hit(
                "crates.io: Rust Package Registry",
                "https://crates.io/",
                "The Rust community's crate registry for sharing and discovering Rust libraries.",
            ),
        ]),
        ("reflexion", vec![
            hit(
                "Reflexion: Language Agents with Verbal Reinforcement Learning",
                "https://arxiv.org/abs/2303.11366",
                "Reflexion agents verbally reflect on task feedback and keep the reflections to improve later attempts.",
            ),
            hit(
                "Self-Refine: Iterative Refinement with Self-Feedback",
                "https://arxiv.org/abs/2303.17651",
                "An approach where the same model drafts, critiques, and refines its own output.",
            ),
        ]),
    ];

    for (keyword, results) in templates {
        if q.contains(keyword) {
            return results.into_iter().take(count).collect();
        }
    }

    (0..count)
        .map(|i| SearchHit {
            title: format!("Result {} for: {}", i + 1, query),
            url: format!("https://example.com/search?q={}&p={}", urlencode(query), i + 1),
            snippet: format!(
                "This is a mock search result for the query '{query}'. A live backend would return real content."
            ),
        })
        .collect()
}

fn urlencode(s: &str) -> String {
    s.replace(' ', "+")
}
