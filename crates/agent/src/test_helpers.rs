//! Shared test helpers: scripted providers and stub lookups.

use async_trait::async_trait;
use reflexion_core::error::{GenerationError, LookupError};
use reflexion_core::lookup::{EvidenceLookup, SearchHit};
use reflexion_core::message::{Conversation, Message};
use reflexion_core::protocol::{AnswerQuestion, Reflection, StructuredCall, ToolCallRequest};
use reflexion_core::provider::{GenerationRequest, GenerationResponse, Provider, RawToolCall, Usage};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::steps::GenerationSettings;

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue and
/// records the request. Panics if more calls are made than responses
/// provided.
pub struct ScriptedProvider {
    responses: Mutex<Vec<Result<GenerationResponse, GenerationError>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<GenerationResponse>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    pub fn with_results(responses: Vec<Result<GenerationResponse, GenerationError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: GenerationError) -> Self {
        Self::with_results(vec![Err(error)])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, request: GenerationRequest) -> Result<GenerationResponse, GenerationError> {
        let mut requests = self.requests.lock().unwrap();
        let responses = self.responses.lock().unwrap();
        let index = requests.len();

        if index >= responses.len() {
            panic!(
                "ScriptedProvider: no more responses (call #{}, have {})",
                index,
                responses.len()
            );
        }

        requests.push(request);
        responses[index].clone()
    }
}

/// A provider that answers every request with the forced tool, forever.
///
/// By default each response carries one call asking for one more lookup.
pub struct AlwaysQueryProvider {
    calls: Mutex<usize>,
    with_queries: bool,
    calls_per_response: usize,
}

impl AlwaysQueryProvider {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(0),
            with_queries: true,
            calls_per_response: 1,
        }
    }

    /// Every call carries an empty `search_queries` list.
    pub fn without_queries() -> Self {
        Self {
            with_queries: false,
            ..Self::new()
        }
    }

    /// Every response carries `n` identical calls.
    pub fn with_calls_per_response(n: usize) -> Self {
        Self {
            calls_per_response: n,
            ..Self::new()
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Provider for AlwaysQueryProvider {
    fn name(&self) -> &str {
        "always_query"
    }

    async fn complete(&self, request: GenerationRequest) -> Result<GenerationResponse, GenerationError> {
        let mut calls = self.calls.lock().unwrap();
        *calls += 1;
        let name = request.tool_choice.unwrap_or_else(|| "AnswerQuestion".into());
        let queries: Vec<String> = if self.with_queries {
            vec![format!("query {}", *calls)]
        } else {
            vec![]
        };
        let arguments = serde_json::json!({
            "answer": format!("answer {}", *calls),
            "search_queries": queries,
        })
        .to_string();

        let mut response = raw_call_response(&name, &arguments);
        response.tool_calls = vec![response.tool_calls[0].clone(); self.calls_per_response];
        Ok(response)
    }
}

/// A provider that never answers; used to exercise cancellation.
pub struct HangingProvider;

#[async_trait]
impl Provider for HangingProvider {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn complete(&self, _request: GenerationRequest) -> Result<GenerationResponse, GenerationError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(GenerationError::Timeout("hanging provider".into()))
    }
}

fn usage() -> Option<Usage> {
    Some(Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    })
}

/// A response carrying one raw tool call.
pub fn raw_call_response(name: &str, arguments: &str) -> GenerationResponse {
    GenerationResponse {
        content: None,
        tool_calls: vec![RawToolCall {
            id: String::new(),
            name: name.into(),
            arguments: arguments.into(),
        }],
        usage: usage(),
        model: "mock-model".into(),
    }
}

/// A draft-shaped response.
pub fn answer_response(answer: &str, queries: &[&str]) -> GenerationResponse {
    raw_call_response(
        "AnswerQuestion",
        &serde_json::json!({
            "answer": answer,
            "reflection": {"missing": "detail", "superfluous": "nothing"},
            "search_queries": queries,
        })
        .to_string(),
    )
}

/// A revision-shaped response.
pub fn revise_response(answer: &str, queries: &[&str]) -> GenerationResponse {
    raw_call_response(
        "ReviseAnswer",
        &serde_json::json!({
            "answer": answer,
            "reflection": {"missing": "", "superfluous": ""},
            "search_queries": queries,
            "references": ["[1] https://example.com"],
        })
        .to_string(),
    )
}

/// A plain-text response with no tool calls.
pub fn text_response(text: &str) -> GenerationResponse {
    GenerationResponse {
        content: Some(text.into()),
        tool_calls: vec![],
        usage: usage(),
        model: "mock-model".into(),
    }
}

pub fn settings(provider: Arc<dyn Provider>) -> GenerationSettings {
    GenerationSettings {
        provider,
        model: "mock-model".into(),
        temperature: 0.7,
        max_tokens: None,
        persona: "expert researcher".into(),
    }
}

/// A conversation whose latest assistant message carries the given
/// `(id, queries)` calls, none answered yet.
pub fn conversation_with_calls(calls: &[(&str, &[&str])]) -> Conversation {
    let mut conv = Conversation::new();
    conv.push(Message::user("question"));
    let calls = calls
        .iter()
        .map(|(id, queries)| ToolCallRequest {
            id: id.to_string(),
            call: StructuredCall::AnswerQuestion(AnswerQuestion {
                answer: "draft".into(),
                reflection: Reflection::default(),
                search_queries: queries.iter().map(|q| q.to_string()).collect(),
            }),
        })
        .collect();
    conv.push(Message::assistant(None, calls));
    conv
}

fn about(query: &str) -> Vec<SearchHit> {
    vec![SearchHit {
        title: format!("About {query}"),
        snippet: format!("Snippet for {query}"),
        url: "https://example.com".into(),
    }]
}

/// Returns one hit per query.
pub struct StaticLookup;

#[async_trait]
impl EvidenceLookup for StaticLookup {
    fn name(&self) -> &str {
        "static"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, LookupError> {
        Ok(about(query))
    }
}

/// Fails for the listed queries, succeeds otherwise.
pub struct FailingLookup {
    fail_on: Vec<String>,
}

impl FailingLookup {
    pub fn on(queries: &[&str]) -> Self {
        Self {
            fail_on: queries.iter().map(|q| q.to_string()).collect(),
        }
    }
}

#[async_trait]
impl EvidenceLookup for FailingLookup {
    fn name(&self) -> &str {
        "failing"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, LookupError> {
        if self.fail_on.iter().any(|q| q == query) {
            return Err(LookupError::ApiError {
                status_code: 503,
                reason: "service unavailable".into(),
            });
        }
        Ok(about(query))
    }
}

/// Sleeps a per-query number of milliseconds before answering.
pub struct DelayedLookup {
    delays: HashMap<String, u64>,
}

impl DelayedLookup {
    pub fn new(delays: &[(&str, u64)]) -> Self {
        Self {
            delays: delays.iter().map(|(q, ms)| (q.to_string(), *ms)).collect(),
        }
    }
}

#[async_trait]
impl EvidenceLookup for DelayedLookup {
    fn name(&self) -> &str {
        "delayed"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, LookupError> {
        let ms = self.delays.get(query).copied().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(about(query))
    }
}
