//! Loop controller: draft → tools → revise → (tools → revise)* → done.
//!
//! The controller owns the conversation for one run, steps through
//! [`LoopState`]s with the pure [`next_state`] function, and hands back the
//! final answer. Cancellation is checked before every step and raced
//! against in-flight generation and lookups.

use chrono::Utc;
use reflexion_config::AppConfig;
use reflexion_core::error::{Error, GenerationError};
use reflexion_core::event::{DomainEvent, EventBus};
use reflexion_core::lookup::EvidenceLookup;
use reflexion_core::message::{Conversation, Message};
use reflexion_core::provider::{GenerationResponse, Provider};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::state::{LoopState, MAX_ITERATIONS, next_state};
use crate::steps::{DraftStep, GenerationSettings, RevisionStep, ToolExecutor};
use crate::trace::{StepRecord, extract_trace};

/// Returned as the answer when the last assistant message carries neither
/// a structured answer nor text.
pub const APOLOGY: &str =
    "I apologize, but I encountered an error processing your query. Please try again.";

/// One run of the loop.
#[derive(Debug, Clone, Default)]
pub struct LoopRequest {
    pub user_text: String,
    pub cancel: Option<CancellationToken>,
    pub include_trace: bool,
}

impl LoopRequest {
    pub fn new(user_text: impl Into<String>) -> Self {
        Self {
            user_text: user_text.into(),
            ..Default::default()
        }
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_trace(mut self, include: bool) -> Self {
        self.include_trace = include;
        self
    }
}

/// The outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct LoopResult {
    pub final_answer: String,
    pub conversation: Conversation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<StepRecord>>,
    /// Tool replies in the conversation
    pub iterations: usize,
}

/// The reflexion agent.
pub struct ReflexionAgent {
    provider: Arc<dyn Provider>,
    lookup: Arc<dyn EvidenceLookup>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    persona: String,
    max_iterations: usize,
    concurrent_lookups: bool,
    request_timeout: Option<Duration>,
    event_bus: Arc<EventBus>,
}

impl ReflexionAgent {
    /// Create a new agent with default settings.
    pub fn new(
        provider: Arc<dyn Provider>,
        lookup: Arc<dyn EvidenceLookup>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            lookup,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            persona: "expert researcher".into(),
            max_iterations: MAX_ITERATIONS,
            concurrent_lookups: true,
            request_timeout: None,
            event_bus: Arc::new(EventBus::default()),
        }
    }

    /// Create an agent with every setting taken from configuration.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        lookup: Arc<dyn EvidenceLookup>,
    ) -> Self {
        Self::new(provider, lookup, &config.generation.model)
            .with_temperature(config.generation.temperature)
            .with_max_tokens(config.generation.max_tokens)
            .with_persona(&config.agent.persona)
            .with_max_iterations(config.agent.max_iterations)
            .with_concurrent_lookups(config.search.concurrent)
            .with_request_timeout(config.agent.request_timeout())
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the default max tokens per generation.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Who the model should act as.
    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    /// Cap on tool replies before the loop stops (at least 1).
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn with_concurrent_lookups(mut self, concurrent: bool) -> Self {
        self.concurrent_lookups = concurrent;
        self
    }

    /// Budget for a whole run; exceeding it fails with a generation timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Publish loop events on a shared bus.
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = bus;
        self
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn lookup_name(&self) -> &str {
        self.lookup.name()
    }

    fn settings(&self) -> GenerationSettings {
        GenerationSettings {
            provider: self.provider.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            persona: self.persona.clone(),
        }
    }

    /// Run the loop to completion.
    ///
    /// Fails with [`Error::InvalidInput`] for blank input, [`Error::Cancelled`]
    /// when the request's token fires, and [`Error::Generation`] when the
    /// backend fails or the run exceeds its time budget.
    pub async fn run(&self, request: LoopRequest) -> Result<LoopResult, Error> {
        let user_text = request.user_text.trim();
        if user_text.is_empty() {
            return Err(Error::InvalidInput("No message provided".into()));
        }

        let run = self.run_inner(user_text, request.cancel.as_ref(), request.include_trace);
        let outcome = match self.request_timeout {
            Some(budget) => match tokio::time::timeout(budget, run).await {
                Ok(outcome) => outcome,
                Err(_) => Err(Error::Generation(GenerationError::Timeout(format!(
                    "run exceeded {}s",
                    budget.as_secs()
                )))),
            },
            None => run.await,
        };

        if let Err(e) = &outcome {
            self.event_bus.publish(DomainEvent::ErrorOccurred {
                context: "reflexion_loop".into(),
                error_message: e.to_string(),
                timestamp: Utc::now(),
            });
        }

        outcome
    }

    async fn run_inner(
        &self,
        user_text: &str,
        cancel: Option<&CancellationToken>,
        include_trace: bool,
    ) -> Result<LoopResult, Error> {
        let settings = self.settings();
        let drafter = DraftStep::new(settings.clone());
        let reviser = RevisionStep::new(settings);
        let executor = ToolExecutor::new(self.lookup.clone(), self.event_bus.clone())
            .with_concurrency(self.concurrent_lookups);

        let mut conversation = Conversation::new();
        conversation.push(Message::user(user_text));
        let conversation_id = conversation.id.to_string();

        info!(
            conversation_id = %conversation_id,
            model = %self.model,
            max_iterations = self.max_iterations,
            "Reflexion loop starting"
        );

        let mut state = LoopState::Drafting;

        while state != LoopState::Done {
            ensure_not_cancelled(cancel)?;
            self.publish_phase(&conversation_id, state);

            match state {
                LoopState::Drafting => {
                    let (message, response) = with_cancel(cancel, async {
                        drafter.draft(user_text).await.map_err(Error::from)
                    })
                    .await?;
                    self.record_response(&conversation_id, &response);
                    conversation.push(message);
                }
                LoopState::ExecutingTools => {
                    let replies = with_cancel(cancel, async {
                        Ok::<_, Error>(executor.execute(&conversation).await)
                    })
                    .await?;
                    debug!(replies = replies.len(), "Tool round finished");
                    for reply in replies {
                        conversation.push(reply);
                    }
                }
                LoopState::Revising => {
                    let (message, response) = with_cancel(cancel, async {
                        reviser.revise(&conversation).await.map_err(Error::from)
                    })
                    .await?;
                    self.record_response(&conversation_id, &response);
                    conversation.push(message);
                }
                LoopState::Done => {}
            }

            state = next_state(state, &conversation, self.max_iterations);
        }

        let iterations = conversation.tool_message_count();
        let final_answer = match conversation.last_assistant() {
            Some(message) => extract_final_answer(message),
            None => {
                warn!("Loop finished without an assistant message");
                APOLOGY.to_string()
            }
        };

        self.event_bus.publish(DomainEvent::LoopFinished {
            conversation_id: conversation_id.clone(),
            tool_rounds: iterations,
            timestamp: Utc::now(),
        });

        info!(
            conversation_id = %conversation_id,
            iterations,
            messages = conversation.messages.len(),
            "Reflexion loop completed"
        );

        let trace = include_trace.then(|| extract_trace(&conversation));

        Ok(LoopResult {
            final_answer,
            conversation,
            trace,
            iterations,
        })
    }

    fn publish_phase(&self, conversation_id: &str, state: LoopState) {
        debug!(conversation_id, phase = %state, "Entering phase");
        self.event_bus.publish(DomainEvent::PhaseEntered {
            conversation_id: conversation_id.to_string(),
            phase: state.to_string(),
            timestamp: Utc::now(),
        });
    }

    fn record_response(&self, conversation_id: &str, response: &GenerationResponse) {
        if let Some(usage) = &response.usage {
            self.event_bus.publish(DomainEvent::ResponseGenerated {
                conversation_id: conversation_id.to_string(),
                model: response.model.clone(),
                tokens_used: usage.total_tokens,
                timestamp: Utc::now(),
            });
        }
    }
}

fn ensure_not_cancelled(cancel: Option<&CancellationToken>) -> Result<(), Error> {
    match cancel {
        Some(token) if token.is_cancelled() => Err(Error::Cancelled),
        _ => Ok(()),
    }
}

/// Race `fut` against the token, if there is one.
async fn with_cancel<T>(
    cancel: Option<&CancellationToken>,
    fut: impl Future<Output = Result<T, Error>>,
) -> Result<T, Error> {
    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(Error::Cancelled),
            out = fut => out,
        },
        None => fut.await,
    }
}

/// The user-facing answer of an assistant message.
///
/// Prefers the `answer` of the first structured call, then the free text,
/// then [`APOLOGY`]. Never fails.
pub fn extract_final_answer(message: &Message) -> String {
    // decoding already rejects empty answers; hand-built calls may not
    if let Some(call) = message
        .tool_calls
        .first()
        .filter(|call| !call.answer().trim().is_empty())
    {
        return call.answer().to_string();
    }
    if let Some(text) = message.text() {
        return text.to_string();
    }
    warn!(message_id = %message.id, "Assistant message has no answer, returning apology");
    APOLOGY.to_string()
}
