//! Kind-specific reducers (§4.5): five pure functions, one per
//! `StreamKind`, folding a state's ordered chunks into a consolidated
//! record. Dispatch is a `match` on the tag, not dynamic dispatch — the
//! compiler checks exhaustiveness whenever a kind is added (§9).

pub mod chat;
pub mod responses;
pub mod speech;
pub mod transcription;

use serde_json::Value;

use super::chunk::{Chunk, ErrorDescriptor, StreamKind};
use super::record::{Payload, ToolCall, Usage};

/// The kind-agnostic shape every reducer folds its output into, so the
/// dispatcher can build a `ConsolidatedRecord`/`DeltaSnapshot` without a
/// second match on kind.
pub struct Folded {
    pub payload: Payload,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<Usage>,
    pub cost: Option<f64>,
    pub cache_debug: Option<Value>,
    pub finish_reason: Option<String>,
}

/// Fold `chunks` (all of kind `kind`) into the consolidated shape.
/// Chat and text-completion share the chat reducer: each keeps its own
/// pool and storage kind, and `chat::chat_like_view` treats a text delta
/// as a chat delta with only `content_fragment` set.
pub fn fold(kind: StreamKind, chunks: &[Chunk], error: Option<&ErrorDescriptor>) -> Folded {
    match kind {
        StreamKind::TextCompletion | StreamKind::ChatCompletion => {
            let r = chat::reduce(chunks, error);
            Folded {
                payload: r.payload,
                tool_calls: r.tool_calls,
                usage: r.usage.map(Usage::Token),
                cost: r.cost,
                cache_debug: r.cache_debug,
                finish_reason: r.finish_reason,
            }
        }
        StreamKind::Speech => {
            let r = speech::reduce(chunks);
            Folded {
                payload: r.payload,
                tool_calls: Vec::new(),
                usage: r.usage.map(Usage::Audio),
                cost: r.cost,
                cache_debug: r.cache_debug,
                finish_reason: r.finish_reason,
            }
        }
        StreamKind::Transcription => {
            let r = transcription::reduce(chunks);
            Folded {
                payload: r.payload,
                tool_calls: Vec::new(),
                usage: r.usage.map(Usage::Transcription),
                cost: r.cost,
                cache_debug: r.cache_debug,
                finish_reason: r.finish_reason,
            }
        }
        StreamKind::Responses => {
            let r = responses::reduce(chunks);
            Folded {
                payload: r.payload,
                tool_calls: r.tool_calls,
                usage: r.usage.map(Usage::Token),
                cost: r.cost,
                cache_debug: r.cache_debug,
                finish_reason: r.finish_reason,
            }
        }
    }
}
