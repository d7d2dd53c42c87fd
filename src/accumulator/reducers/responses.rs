//! Responses (provider-structured event stream) reducer (§4.5 "Responses
//! reducer").
//!
//! The stream carries opaque structured events. Each event is deep-cloned
//! at ingest (see `deep_clone_event`, called by the dispatcher) to break
//! aliasing with the provider adapter's buffers, since the event graph is
//! otherwise just a borrowed `serde_json::Value`.

use serde_json::Value;
use tracing::warn;

use crate::accumulator::chunk::{Chunk, TokenUsage};
use crate::accumulator::record::{Payload, ToolCall};

pub struct ResponsesReduction {
    pub payload: Payload,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<TokenUsage>,
    pub cost: Option<f64>,
    pub cache_debug: Option<Value>,
    pub finish_reason: Option<String>,
}

/// Serialize/deserialize round-trip used as the "binary serializer" from
/// §6 Egress. `serde_json` is this codebase's serializer for opaque
/// event payloads everywhere else (`events/types/*.rs`), so the
/// responses reducer's defensive clone uses the same round-trip rather
/// than introducing a second serialization format. Failure is logged and
/// the original event is kept (best-effort, §7 class 3).
pub fn deep_clone_event(event: &Value) -> Value {
    match serde_json::to_vec(event) {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(clone) => clone,
            Err(err) => {
                warn!(error = %err, "responses event clone failed to deserialize, keeping original");
                event.clone()
            }
        },
        Err(err) => {
            warn!(error = %err, "responses event clone failed to serialize, keeping original");
            event.clone()
        }
    }
}

fn usage_from_value(value: &Value) -> Option<TokenUsage> {
    let usage = value.get("usage")?;
    let prompt_tokens = usage
        .get("prompt_tokens")
        .or_else(|| usage.get("input_tokens"))
        .and_then(Value::as_i64)
        .unwrap_or(0);
    let completion_tokens = usage
        .get("completion_tokens")
        .or_else(|| usage.get("output_tokens"))
        .and_then(Value::as_i64)
        .unwrap_or(0);
    let total_tokens = usage
        .get("total_tokens")
        .and_then(Value::as_i64)
        .unwrap_or(prompt_tokens + completion_tokens);
    Some(TokenUsage {
        prompt_tokens,
        completion_tokens,
        total_tokens,
    })
}

fn is_zero(usage: &TokenUsage) -> bool {
    usage.prompt_tokens == 0 && usage.completion_tokens == 0 && usage.total_tokens == 0
}

/// Flatten the final structured output into a single output-message
/// string and tool-call list, for downstream logging convenience.
fn flatten_output(response: &Value) -> (Option<String>, Vec<ToolCall>) {
    let mut message = String::new();
    let mut tool_calls = Vec::new();

    let Some(items) = response.get("output").and_then(Value::as_array) else {
        return (None, tool_calls);
    };

    for item in items {
        match item.get("type").and_then(Value::as_str) {
            Some("message") => {
                if let Some(content) = item.get("content").and_then(Value::as_array) {
                    for block in content {
                        if let Some(text) = block.get("text").and_then(Value::as_str) {
                            message.push_str(text);
                        }
                    }
                }
            }
            Some("function_call") => {
                tool_calls.push(ToolCall {
                    id: item
                        .get("call_id")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    name: item
                        .get("name")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    arguments: item
                        .get("arguments")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                });
            }
            _ => {}
        }
    }

    (if message.is_empty() { None } else { Some(message) }, tool_calls)
}

/// Extract the complete structured response from the last event and fold
/// usage/cost/cache-debug/finish-reason from their respective last chunk
/// (§4.5, §9 Open Question: fields are independent).
pub fn reduce(chunks: &[Chunk]) -> ResponsesReduction {
    let mut last_event: Value = Value::Null;
    let mut top_level_usage = None;
    let mut cost = None;
    let mut cache_debug = None;
    let mut finish_reason = None;

    for chunk in chunks {
        let Chunk::Responses {
            envelope,
            usage: chunk_usage,
            event,
        } = chunk
        else {
            continue;
        };

        last_event = event.clone();

        if chunk_usage.is_some() {
            top_level_usage = chunk_usage.clone();
        }
        if envelope.cost.is_some() {
            cost = envelope.cost;
        }
        if envelope.cache_debug.is_some() {
            cache_debug = envelope.cache_debug.clone();
        }
        if envelope.finish_reason.is_some() {
            finish_reason = envelope.finish_reason.clone();
        }
    }

    let usage = match &top_level_usage {
        Some(usage) if !is_zero(usage) => Some(usage.clone()),
        _ => usage_from_value(&last_event).or(top_level_usage),
    };

    let (output_message, tool_calls) = flatten_output(&last_event);

    ResponsesReduction {
        payload: Payload::Responses {
            response: last_event,
            output_message,
        },
        tool_calls,
        usage,
        cost,
        cache_debug,
        finish_reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::chunk::ChunkEnvelope;
    use serde_json::json;

    fn responses_chunk(event: Value, usage: Option<TokenUsage>) -> Chunk {
        Chunk::Responses {
            envelope: ChunkEnvelope::default(),
            usage,
            event,
        }
    }

    #[test]
    fn deep_clone_round_trips_event() {
        let event = json!({"type": "response.delta", "text": "hi"});
        let cloned = deep_clone_event(&event);
        assert_eq!(event, cloned);
    }

    #[test]
    fn last_event_usage_used_when_top_level_absent() {
        let chunks = vec![
            responses_chunk(json!({"type": "response.delta"}), None),
            responses_chunk(
                json!({
                    "type": "response.completed",
                    "usage": {"prompt_tokens": 4, "completion_tokens": 6, "total_tokens": 10},
                    "output": [],
                }),
                None,
            ),
        ];

        let reduction = reduce(&chunks);
        assert_eq!(reduction.usage.unwrap().total_tokens, 10);
    }

    #[test]
    fn top_level_usage_preferred_when_nonzero() {
        let chunks = vec![responses_chunk(
            json!({"usage": {"total_tokens": 999}}),
            Some(TokenUsage {
                prompt_tokens: 1,
                completion_tokens: 1,
                total_tokens: 2,
            }),
        )];

        let reduction = reduce(&chunks);
        assert_eq!(reduction.usage.unwrap().total_tokens, 2);
    }

    #[test]
    fn flattens_output_message_and_tool_calls() {
        let event = json!({
            "output": [
                {"type": "message", "content": [{"type": "output_text", "text": "hello "}, {"type": "output_text", "text": "world"}]},
                {"type": "function_call", "call_id": "c1", "name": "get_weather", "arguments": "{\"city\":\"Paris\"}"},
            ]
        });
        let chunks = vec![responses_chunk(event.clone(), None)];
        let reduction = reduce(&chunks);
        match reduction.payload {
            Payload::Responses { output_message, response } => {
                assert_eq!(output_message.as_deref(), Some("hello world"));
                assert_eq!(response, event);
            }
            _ => panic!("expected responses payload"),
        }
        assert_eq!(reduction.tool_calls.len(), 1);
        assert_eq!(reduction.tool_calls[0].name, "get_weather");
    }
}
