//! Structured-response protocol — the contract between the loop and the
//! generation backend.
//!
//! The backend is asked to answer through exactly one of two "tools":
//! `AnswerQuestion` for the draft and `ReviseAnswer` for every revision.
//! Their arguments carry the answer, a self-critique, follow-up search
//! queries and (for revisions) citations. The closed set is modelled as
//! [`StructuredCall`], so field access is checked at compile time instead
//! of going through name strings.
//!
//! Backends hand tool calls back as raw JSON strings ([`RawToolCall`]).
//! [`ToolCallRequest::decode`] turns those into typed calls, applying a
//! small amount of local repair first (markdown fences, prose around the
//! object, double-encoded JSON, a bare string where a list is expected).
//! Anything that still does not fit is a
//! [`GenerationError::MalformedResponse`].

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::GenerationError;
use crate::provider::{RawToolCall, ToolDefinition};

/// The closed set of structured tools the backend may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    AnswerQuestion,
    ReviseAnswer,
}

impl Capability {
    pub fn name(&self) -> &'static str {
        match self {
            Capability::AnswerQuestion => "AnswerQuestion",
            Capability::ReviseAnswer => "ReviseAnswer",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "AnswerQuestion" => Some(Capability::AnswerQuestion),
            "ReviseAnswer" => Some(Capability::ReviseAnswer),
            _ => None,
        }
    }

    /// The tool definition sent to the backend so it knows the schema.
    pub fn definition(&self) -> ToolDefinition {
        let reflection = serde_json::json!({
            "type": "object",
            "description": "Your reflection on the initial answer.",
            "properties": {
                "missing": {
                    "type": "string",
                    "description": "Critique of what is missing."
                },
                "superfluous": {
                    "type": "string",
                    "description": "Critique of what is superfluous."
                }
            },
            "required": ["missing", "superfluous"]
        });

        match self {
            Capability::AnswerQuestion => ToolDefinition {
                name: self.name().into(),
                description: "Answer the question. Provide an answer, reflection, and then follow up with search queries to improve the answer.".into(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "answer": {
                            "type": "string",
                            "description": "~250 word detailed answer to the question."
                        },
                        "reflection": reflection,
                        "search_queries": {
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "1-3 search queries for researching improvements to address the critique of your current answer."
                        }
                    },
                    "required": ["answer", "reflection", "search_queries"]
                }),
            },
            Capability::ReviseAnswer => ToolDefinition {
                name: self.name().into(),
                description: "Revise your original answer to your question. Provide an answer, reflection, cite your reflection with references, and finally add search queries to improve the answer.".into(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "answer": {
                            "type": "string",
                            "description": "~250 word detailed answer to the question."
                        },
                        "reflection": reflection,
                        "search_queries": {
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "1-3 search queries for researching improvements to address the critique of your current answer."
                        },
                        "references": {
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "Citations motivating your updated answer."
                        }
                    },
                    "required": ["answer", "reflection", "search_queries", "references"]
                }),
            },
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Self-critique attached to every structured answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reflection {
    /// What the answer lacks.
    #[serde(default)]
    pub missing: String,
    /// What the answer could drop.
    #[serde(default)]
    pub superfluous: String,
}

/// Arguments of the draft answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerQuestion {
    pub answer: String,
    #[serde(default)]
    pub reflection: Reflection,
    #[serde(default, deserialize_with = "string_or_list")]
    pub search_queries: Vec<String>,
}

/// Arguments of a revised answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviseAnswer {
    pub answer: String,
    #[serde(default)]
    pub reflection: Reflection,
    #[serde(default, deserialize_with = "string_or_list")]
    pub search_queries: Vec<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub references: Vec<String>,
}

/// A typed structured call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "arguments")]
pub enum StructuredCall {
    AnswerQuestion(AnswerQuestion),
    ReviseAnswer(ReviseAnswer),
}

impl StructuredCall {
    pub fn capability(&self) -> Capability {
        match self {
            StructuredCall::AnswerQuestion(_) => Capability::AnswerQuestion,
            StructuredCall::ReviseAnswer(_) => Capability::ReviseAnswer,
        }
    }

    pub fn answer(&self) -> &str {
        match self {
            StructuredCall::AnswerQuestion(a) => &a.answer,
            StructuredCall::ReviseAnswer(r) => &r.answer,
        }
    }

    pub fn reflection(&self) -> &Reflection {
        match self {
            StructuredCall::AnswerQuestion(a) => &a.reflection,
            StructuredCall::ReviseAnswer(r) => &r.reflection,
        }
    }

    pub fn search_queries(&self) -> &[String] {
        match self {
            StructuredCall::AnswerQuestion(a) => &a.search_queries,
            StructuredCall::ReviseAnswer(r) => &r.search_queries,
        }
    }

    /// Citations; drafts never carry any.
    pub fn references(&self) -> &[String] {
        match self {
            StructuredCall::AnswerQuestion(_) => &[],
            StructuredCall::ReviseAnswer(r) => &r.references,
        }
    }

    /// The call's arguments re-encoded as a JSON object string.
    pub fn arguments_json(&self) -> Result<String, serde_json::Error> {
        match self {
            StructuredCall::AnswerQuestion(a) => serde_json::to_string(a),
            StructuredCall::ReviseAnswer(r) => serde_json::to_string(r),
        }
    }
}

/// A structured tool call emitted by an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Unique within the conversation; tool replies link back through it.
    pub id: String,
    pub call: StructuredCall,
}

impl ToolCallRequest {
    pub fn new(call: StructuredCall) -> Self {
        Self {
            id: fresh_call_id(),
            call,
        }
    }

    pub fn name(&self) -> Capability {
        self.call.capability()
    }

    pub fn answer(&self) -> &str {
        self.call.answer()
    }

    pub fn search_queries(&self) -> &[String] {
        self.call.search_queries()
    }

    /// Decode one raw backend call into a typed request.
    pub fn decode(raw: &RawToolCall) -> Result<Self, GenerationError> {
        let capability = Capability::from_name(&raw.name).ok_or_else(|| {
            GenerationError::MalformedResponse {
                tool: raw.name.clone(),
                reason: "unknown tool name".into(),
            }
        })?;

        let malformed = |reason: String| GenerationError::MalformedResponse {
            tool: capability.name().into(),
            reason,
        };

        let value = parse_arguments(&raw.arguments).ok_or_else(|| {
            malformed(format!(
                "arguments are not a JSON object: {}",
                preview(&raw.arguments)
            ))
        })?;
        let value = unwrap_named(value, capability);

        let call = match capability {
            Capability::AnswerQuestion => serde_json::from_value::<AnswerQuestion>(value)
                .map(|mut a| {
                    a.search_queries = clean_list(a.search_queries);
                    StructuredCall::AnswerQuestion(a)
                }),
            Capability::ReviseAnswer => serde_json::from_value::<ReviseAnswer>(value)
                .map(|mut r| {
                    r.search_queries = clean_list(r.search_queries);
                    r.references = clean_list(r.references);
                    StructuredCall::ReviseAnswer(r)
                }),
        }
        .map_err(|e| malformed(e.to_string()))?;

        if call.answer().trim().is_empty() {
            return Err(malformed("empty answer".into()));
        }

        let id = if raw.id.trim().is_empty() {
            fresh_call_id()
        } else {
            raw.id.clone()
        };

        Ok(Self { id, call })
    }

    /// Decode every raw call of one response.
    ///
    /// IDs already used in the conversation (`taken`) or repeated within
    /// the response are replaced so that replies stay unambiguous.
    pub fn decode_all(
        raws: &[RawToolCall],
        taken: &HashSet<String>,
    ) -> Result<Vec<Self>, GenerationError> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut calls = Vec::with_capacity(raws.len());

        for raw in raws {
            let mut call = Self::decode(raw)?;
            if taken.contains(&call.id) || seen.contains(&call.id) {
                let replacement = fresh_call_id();
                debug!(old = %call.id, new = %replacement, "Reassigning duplicate tool call id");
                call.id = replacement;
            }
            seen.insert(call.id.clone());
            calls.push(call);
        }

        Ok(calls)
    }
}

fn fresh_call_id() -> String {
    format!("call_{}", Uuid::new_v4().simple())
}

// --- Local repair ---

/// Parse tool arguments, repairing the usual ways models mangle JSON.
fn parse_arguments(raw: &str) -> Option<serde_json::Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let candidates = [
        Some(trimmed.to_string()),
        strip_code_fence(trimmed),
        outermost_object(trimmed),
    ];

    for candidate in candidates.into_iter().flatten() {
        match serde_json::from_str::<serde_json::Value>(&candidate) {
            Ok(serde_json::Value::Object(map)) => {
                if candidate != trimmed {
                    warn!("Repaired malformed tool arguments");
                }
                return Some(serde_json::Value::Object(map));
            }
            // Double-encoded: the object arrived as a JSON string.
            Ok(serde_json::Value::String(inner)) => {
                if let Some(v) = parse_arguments(&inner) {
                    return Some(v);
                }
            }
            _ => {}
        }
    }

    None
}

fn strip_code_fence(s: &str) -> Option<String> {
    let rest = s.strip_prefix("```")?;
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    let body = rest.trim_end().strip_suffix("```")?;
    Some(body.trim().to_string())
}

fn outermost_object(s: &str) -> Option<String> {
    let start = s.find('{')?;
    let end = s.rfind('}')?;
    (end > start).then(|| s[start..=end].to_string())
}

/// Some backends nest the arguments under the tool name.
fn unwrap_named(value: serde_json::Value, capability: Capability) -> serde_json::Value {
    match value {
        serde_json::Value::Object(mut map) if map.len() == 1 && map.contains_key(capability.name()) => {
            map.remove(capability.name()).unwrap_or(serde_json::Value::Null)
        }
        other => other,
    }
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn preview(s: &str) -> String {
    let mut out: String = s.chars().take(80).collect();
    if s.chars().count() > 80 {
        out.push_str("...");
    }
    out
}

/// Accept `["a", "b"]`, `"a"`, or `null` for list-valued arguments.
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
        Null(()),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
        OneOrMany::Null(()) => Vec::new(),
    })
}
