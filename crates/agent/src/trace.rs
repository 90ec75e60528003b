//! Step trace: a readable record of every content-bearing message.
//!
//! Phase labels come from a small fixed list of marker phrases. They are a
//! best-effort hint for display and fall back to `unknown`; nothing in the
//! loop depends on them.

use chrono::{DateTime, Utc};
use reflexion_core::message::{Conversation, Message};
use serde::{Deserialize, Serialize};
use tracing::warn;

const SUMMARY_CHARS: usize = 150;

const FINAL_ANSWER_MARKERS: &[&str] = &["final answer", "in conclusion", "to conclude", "in summary"];
const REVISION_MARKERS: &[&str] = &["revised", "revision", "updated answer", "references:", "improved answer"];
const INITIAL_MARKERS: &[&str] = &["initial analysis", "initial answer", "first draft", "preliminary"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    InitialAnalysis,
    FinalAnswer,
    Revision,
    Unknown,
    Error,
}

/// One entry of the step trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// 1-based position in the trace
    pub step: usize,
    pub phase: Phase,
    pub summary: String,
    pub full_text: String,
    pub timestamp: DateTime<Utc>,
}

/// Build the step trace for a finished conversation.
///
/// Never fails: an empty conversation yields one placeholder record and an
/// internal failure yields one `Error` record.
pub fn extract_trace(conversation: &Conversation) -> Vec<StepRecord> {
    match try_extract(conversation) {
        Ok(records) if records.is_empty() => vec![StepRecord {
            step: 1,
            phase: Phase::Unknown,
            summary: "No intermediate steps recorded".into(),
            full_text: String::new(),
            timestamp: Utc::now(),
        }],
        Ok(records) => records,
        Err(e) => {
            warn!(error = %e, "Trace extraction failed");
            vec![StepRecord {
                step: 1,
                phase: Phase::Error,
                summary: "Trace extraction failed".into(),
                full_text: e.to_string(),
                timestamp: Utc::now(),
            }]
        }
    }
}

fn try_extract(conversation: &Conversation) -> Result<Vec<StepRecord>, serde_json::Error> {
    let mut records = Vec::new();

    for message in &conversation.messages {
        let Some((headline, full_text)) = message_text(message)? else {
            continue;
        };

        records.push(StepRecord {
            step: records.len() + 1,
            phase: classify(&headline),
            summary: summarize(&headline),
            full_text,
            timestamp: message.timestamp,
        });
    }

    Ok(records)
}

/// The text a message contributes: its free-text content, or for a
/// structured-only assistant message, the answer of its first call plus the
/// call's arguments as pretty JSON.
fn message_text(message: &Message) -> Result<Option<(String, String)>, serde_json::Error> {
    if let Some(text) = message.text() {
        return Ok(Some((text.to_string(), text.to_string())));
    }

    let Some(call) = message.tool_calls.first() else {
        return Ok(None);
    };

    let arguments: serde_json::Value = serde_json::from_str(&call.call.arguments_json()?)?;
    let full_text = format!("{}\n\n{}", call.answer(), serde_json::to_string_pretty(&arguments)?);
    Ok(Some((call.answer().to_string(), full_text)))
}

/// Heuristic phase label from marker phrases.
pub fn classify(text: &str) -> Phase {
    let lower = text.to_lowercase();
    let has = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));

    if has(FINAL_ANSWER_MARKERS) {
        Phase::FinalAnswer
    } else if has(REVISION_MARKERS) {
        Phase::Revision
    } else if has(INITIAL_MARKERS) {
        Phase::InitialAnalysis
    } else {
        Phase::Unknown
    }
}

fn summarize(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= SUMMARY_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(SUMMARY_CHARS).collect();
    format!("{}...", cut.trim_end())
}
