//! The consolidated record: the single authoritative output of a completed
//! stream, plus the per-kind payload and supporting types it carries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::chunk::{AudioUsage, ErrorDescriptor, MessageContent, TokenUsage, TranscriptionUsage};

/// Usage is kind-shaped: chat/text/responses streams report token usage,
/// speech reports audio usage, transcription reports its own counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Usage {
    Token(TokenUsage),
    Audio(AudioUsage),
    Transcription(TranscriptionUsage),
}

/// Final status of a consolidated record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    Error,
}

/// One fully-reassembled tool call, extracted from chat tool-call
/// fragments by the chat reducer's folding rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: Option<String>,
    pub name: String,
    pub arguments: String,
}

/// The reassembled assistant message produced by the chat/text reducers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
    pub refusal: Option<String>,
}

/// The kind-specific payload carried by a `ConsolidatedRecord`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Payload {
    Chat { message: ChatMessage },
    Speech { audio: Vec<u8> },
    Transcription { text: String },
    Responses {
        response: Value,
        output_message: Option<String>,
    },
}

/// The single authoritative output of a completed (or abandoned-then-TTL'd
/// — though the TTL path never emits a record, see §4.6) stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidatedRecord {
    pub request_id: String,
    pub status: Status,
    pub stream: bool,
    pub start_timestamp: Option<DateTime<Utc>>,
    pub end_timestamp: Option<DateTime<Utc>>,
    pub latency_ms: i64,
    pub payload: Payload,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<Usage>,
    pub cost: Option<f64>,
    pub cache_debug: Option<Value>,
    pub error: Option<ErrorDescriptor>,
    pub object_tag: Option<String>,
    pub finish_reason: Option<String>,
    pub model: Option<String>,
    pub provider: Option<String>,
}

impl ConsolidatedRecord {
    /// `(end - start)` in milliseconds if both are set, else 0 (§4.5
    /// "Latency", P8).
    pub fn latency_ms(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> i64 {
        match (start, end) {
            (Some(s), Some(e)) if e >= s => (e - s).num_milliseconds(),
            _ => 0,
        }
    }

    /// `error` if an error descriptor is present, else `success` (§4.5
    /// "Status").
    pub fn status_for(error: &Option<ErrorDescriptor>) -> Status {
        if error.is_some() {
            Status::Error
        } else {
            Status::Success
        }
    }
}

/// A running, non-terminal snapshot of a stream's progress, returned from
/// `process()` on non-terminal chunks (§4.4 step 3). Cheaper than a full
/// `ConsolidatedRecord`: callers that only forward deltas (e.g. live-edit
/// UIs) don't need status/latency/tool-calls on every chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaSnapshot {
    pub request_id: String,
    pub payload: Payload,
    pub finish_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn latency_is_zero_when_either_timestamp_missing() {
        let now = Utc::now();
        assert_eq!(ConsolidatedRecord::latency_ms(None, Some(now)), 0);
        assert_eq!(ConsolidatedRecord::latency_ms(Some(now), None), 0);
    }

    #[test]
    fn latency_matches_millisecond_delta() {
        let start = Utc::now();
        let end = start + Duration::milliseconds(250);
        assert_eq!(ConsolidatedRecord::latency_ms(Some(start), Some(end)), 250);
    }

    #[test]
    fn status_reflects_error_presence() {
        assert_eq!(ConsolidatedRecord::status_for(&None), Status::Success);
        assert_eq!(
            ConsolidatedRecord::status_for(&Some(ErrorDescriptor {
                error_type: "rate_limit".into(),
                message: "429".into(),
            })),
            Status::Error
        );
    }
}
