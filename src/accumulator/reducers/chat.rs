//! Chat (and text-completion) reducer (§4.5 "Chat reducer", "Text
//! reducer").
//!
//! A pure function of the ordered chunk list, the state's object-tag, and
//! an optional terminal error — never mutates its input, allocates its own
//! output. Text-completion chunks keep their own kind end-to-end (their
//! own pool, their own `Chunk::TextCompletion` storage) but fold through
//! this same implementation: `chat_like_view` treats a `TextDelta` as a
//! `ChatDelta` with only `content_fragment` set.

use tracing::warn;

use crate::accumulator::chunk::{
    ChatDelta, Chunk, ChunkEnvelope, ErrorDescriptor, MessageContent, TokenUsage,
};
use crate::accumulator::record::{ChatMessage, Payload, ToolCall};

/// Borrowed view shared by `Chunk::ChatCompletion` and
/// `Chunk::TextCompletion`: a `TextDelta` is equivalent to a `ChatDelta`
/// with only `content_fragment` set, so text-completion chunks fold
/// through this same reducer without ever being stored as a different
/// chunk kind (each kind keeps its own pool, §4.1).
fn chat_like_view(chunk: &Chunk) -> Option<(&ChunkEnvelope, Option<&TokenUsage>, ChatDelta)> {
    match chunk {
        Chunk::ChatCompletion {
            envelope,
            usage,
            delta,
        } => Some((envelope, usage.as_ref(), delta.clone())),
        Chunk::TextCompletion {
            envelope,
            usage,
            delta,
        } => Some((
            envelope,
            usage.as_ref(),
            ChatDelta {
                content_fragment: delta.content_fragment.clone(),
                ..Default::default()
            },
        )),
        _ => None,
    }
}

/// Output of folding a chat chunk list, before the caller (the dispatcher)
/// wraps it into a full `ConsolidatedRecord` with timestamps/status.
pub struct ChatReduction {
    pub payload: Payload,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<TokenUsage>,
    pub cost: Option<f64>,
    pub cache_debug: Option<serde_json::Value>,
    pub finish_reason: Option<String>,
}

struct ToolCallBuilder {
    id: Option<String>,
    name: String,
    arguments: String,
}

/// Fold an ordered list of chat chunks into a single assistant message
/// (§4.5). Chunks of any other variant are ignored — a request's chunk
/// list holds exactly one kind by construction (§3 Invariant: stream-kind
/// is implied by which chunk list is non-empty).
pub fn reduce(chunks: &[Chunk], _error: Option<&ErrorDescriptor>) -> ChatReduction {
    let mut role = "assistant".to_string();
    let mut content = String::new();
    let mut refusal: Option<String> = None;
    let mut tool_calls: Vec<ToolCallBuilder> = Vec::new();

    let mut usage = None;
    let mut cost = None;
    let mut cache_debug = None;
    let mut finish_reason = None;

    for chunk in chunks {
        let Some((envelope, chunk_usage, delta)) = chat_like_view(chunk) else {
            continue;
        };

        if let Some(r) = &delta.role {
            role = r.clone();
        }
        // `MessageContent::Blocks` is never built here: the normalized
        // `ChatDelta` this crate's ingest contract defines carries only a
        // flat `content_fragment: Option<String>` (§3 Data Model — chat
        // chunks carry a text-content *fragment*, not a typed block).
        // Whether a provider's own wire format splits content into typed
        // blocks is a transport/adapter concern the core explicitly does
        // not handle (§1 Non-goals: "does not transform provider-specific
        // wire formats"); by the time a delta reaches this reducer it has
        // already been flattened. See DESIGN.md for the full resolution.
        if let Some(fragment) = &delta.content_fragment {
            content.push_str(fragment);
        }
        if let Some(fragment) = &delta.refusal_fragment {
            match refusal.as_mut() {
                Some(existing) => existing.push_str(fragment),
                None => refusal = Some(fragment.clone()),
            }
        }

        for fragment in &delta.tool_call_fragments {
            match &fragment.function_name {
                Some(name) => {
                    // A literal "{}" first-fragment arguments string is
                    // normalized to empty so a later appended fragment
                    // doesn't double the opening brace (P5).
                    let initial_arguments = if fragment.arguments_fragment == "{}" {
                        String::new()
                    } else {
                        fragment.arguments_fragment.clone()
                    };
                    tool_calls.push(ToolCallBuilder {
                        id: fragment.id.clone(),
                        name: name.clone(),
                        arguments: initial_arguments,
                    });
                }
                None => match tool_calls.last_mut() {
                    Some(last) => last.arguments.push_str(&fragment.arguments_fragment),
                    None => warn!(
                        "tool-call fragment without a preceding function-name anchor was dropped"
                    ),
                },
            }
        }

        if chunk_usage.is_some() {
            usage = chunk_usage.cloned();
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

    let message = ChatMessage {
        role,
        content: MessageContent::Text(content),
        refusal,
    };

    ChatReduction {
        payload: Payload::Chat { message },
        tool_calls: tool_calls
            .into_iter()
            .map(|b| ToolCall {
                id: b.id,
                name: b.name,
                arguments: b.arguments,
            })
            .collect(),
        usage,
        cost,
        cache_debug,
        finish_reason,
    }
}
