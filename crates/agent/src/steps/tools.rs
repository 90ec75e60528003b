//! Tool-execution step: answer every pending call with evidence lookups.
//!
//! Each pending call gets exactly one `tool` reply whose content is a JSON
//! object keyed by query. A failed lookup becomes
//! `{"error": "...", "results": []}` under its query; the step itself
//! never fails. Keys keep query order (serde_json `preserve_order`).

use chrono::Utc;
use futures::future::join_all;
use reflexion_core::error::LookupError;
use reflexion_core::event::{DomainEvent, EventBus};
use reflexion_core::lookup::{EvidenceLookup, SearchHit};
use reflexion_core::message::{Conversation, Message};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

pub struct ToolExecutor {
    lookup: Arc<dyn EvidenceLookup>,
    concurrent: bool,
    event_bus: Arc<EventBus>,
}

impl ToolExecutor {
    pub fn new(lookup: Arc<dyn EvidenceLookup>, event_bus: Arc<EventBus>) -> Self {
        Self {
            lookup,
            concurrent: true,
            event_bus,
        }
    }

    /// Issue the queries of one call concurrently (default) or one by one.
    pub fn with_concurrency(mut self, concurrent: bool) -> Self {
        self.concurrent = concurrent;
        self
    }

    /// Build one reply per pending call on the latest assistant message,
    /// in the order the calls were emitted.
    pub async fn execute(&self, conversation: &Conversation) -> Vec<Message> {
        let pending = conversation.pending_tool_calls();
        if pending.is_empty() {
            debug!("No pending tool calls, nothing to execute");
            return Vec::new();
        }

        let mut replies = Vec::with_capacity(pending.len());

        for call in pending {
            let queries = unique_queries(call.search_queries());
            let outcomes = self.run_queries(&queries).await;

            let mut body = Map::new();
            for (query, outcome) in queries.into_iter().zip(outcomes) {
                body.insert(query, outcome_to_value(outcome));
            }

            debug!(call_id = %call.id, queries = body.len(), "Tool call answered");
            replies.push(Message::tool_result(&call.id, Value::Object(body).to_string()));
        }

        replies
    }

    /// Results come back in query order regardless of completion order.
    async fn run_queries(&self, queries: &[String]) -> Vec<Result<Vec<SearchHit>, LookupError>> {
        if self.concurrent {
            join_all(queries.iter().map(|q| self.lookup_one(q))).await
        } else {
            let mut outcomes = Vec::with_capacity(queries.len());
            for q in queries {
                outcomes.push(self.lookup_one(q).await);
            }
            outcomes
        }
    }

    async fn lookup_one(&self, query: &str) -> Result<Vec<SearchHit>, LookupError> {
        let start = Instant::now();
        let outcome = self.lookup.search(query).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match &outcome {
            Ok(hits) => debug!(query, hits = hits.len(), duration_ms, "Lookup completed"),
            Err(e) => warn!(query, error = %e, backend = self.lookup.name(), "Lookup failed, using placeholder"),
        }

        self.event_bus.publish(DomainEvent::LookupCompleted {
            query: query.to_string(),
            hits: outcome.as_ref().map(|h| h.len()).unwrap_or(0),
            success: outcome.is_ok(),
            duration_ms,
            timestamp: Utc::now(),
        });

        outcome
    }
}

/// Drop blank and repeated queries, keeping first-seen order.
fn unique_queries(queries: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(queries.len());
    for q in queries {
        let q = q.trim();
        if !q.is_empty() && !out.iter().any(|seen| seen == q) {
            out.push(q.to_string());
        }
    }
    out
}

fn outcome_to_value(outcome: Result<Vec<SearchHit>, LookupError>) -> Value {
    match outcome {
        Ok(hits) => Value::Array(
            hits.into_iter()
                .map(|h| json!({ "title": h.title, "url": h.url, "content": h.snippet }))
                .collect(),
        ),
        Err(e) => json!({ "error": e.reason(), "results": [] }),
    }
}
