//! Stream kinds and the tagged-variant chunk type.
//!
//! Corresponds to the Data Model section of the streaming accumulator spec.
//!
//! Every chunk that reaches the dispatcher is normalized to one of five
//! kind-specific payloads. `Chunk` is a closed, tagged-variant type rather
//! than a trait object: the reducer dispatch table (see `reducers::mod`)
//! matches on `StreamKind` and the compiler checks exhaustiveness.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The modality of a stream. Determines which reducer runs and which
/// chunk pool backs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StreamKind {
    TextCompletion,
    ChatCompletion,
    Speech,
    Transcription,
    Responses,
}

impl StreamKind {
    /// All kinds, in pool-construction order.
    pub const ALL: [StreamKind; 5] = [
        StreamKind::TextCompletion,
        StreamKind::ChatCompletion,
        StreamKind::Speech,
        StreamKind::Transcription,
        StreamKind::Responses,
    ];
}

/// A provider error surfaced on a chunk (§7 class 2: provider stream error).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    pub error_type: String,
    pub message: String,
}

/// Token usage counters shared by the text/chat/responses kinds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
}

/// Audio-specific usage counters for the speech kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioUsage {
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub total_tokens: i64,
}

/// Transcription-specific usage counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscriptionUsage {
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub total_tokens: i64,
}

/// A tool-call fragment within a chat delta. Folded by the chat reducer's
/// tool-call folding rule (see `reducers::chat`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolCallFragment {
    pub id: Option<String>,
    pub function_name: Option<String>,
    pub arguments_fragment: String,
}

/// Either a single content string, or a list of typed content blocks, as
/// produced by providers that split text into structured blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// One typed content block within a `MessageContent::Blocks` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
}

/// Delta payload for chat (and, via the dispatcher's wrapping, text)
/// chunks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatDelta {
    pub role: Option<String>,
    pub content_fragment: Option<String>,
    pub refusal_fragment: Option<String>,
    pub tool_call_fragments: Vec<ToolCallFragment>,
}

/// Delta payload for a plain text-completion chunk. Stored and pooled
/// under its own kind; the chat reducer's `chat_like_view` treats it as
/// a `ChatDelta` with only `content_fragment` set (§4.5).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextDelta {
    pub content_fragment: Option<String>,
}

/// Delta payload for a speech (audio-out) chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpeechDelta {
    #[serde(with = "serde_bytes_vec")]
    pub audio: Vec<u8>,
}

/// The typed delta kind carried by a transcription event. Only
/// `TranscriptText` contributes characters to the final text (§4.5, P7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptionDeltaType {
    TranscriptTextDelta,
    Other,
}

impl TranscriptionDeltaType {
    /// Parse the provider's literal delta-type string, collapsing any
    /// value other than the one that feeds the text reducer into `Other`.
    pub fn from_wire(tag: &str) -> Self {
        if tag == "transcript.text.delta" {
            TranscriptionDeltaType::TranscriptTextDelta
        } else {
            TranscriptionDeltaType::Other
        }
    }
}

/// Delta payload for a transcription (audio-in) chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionDelta {
    pub delta_type: TranscriptionDeltaType,
    pub text_fragment: Option<String>,
}

/// Fields common to every chunk variant, regardless of kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkEnvelope {
    pub received_at: Option<DateTime<Utc>>,
    pub error: Option<ErrorDescriptor>,
    pub object_tag: Option<String>,
    pub cost: Option<f64>,
    pub cache_debug: Option<Value>,
    pub finish_reason: Option<String>,
}

/// One normalized chunk, tagged by stream kind. This is both the shape the
/// caller hands to `process()` and the shape held in the pool / per-request
/// chunk list — the dispatcher copies a caller-provided chunk into a pooled
/// one defensively (§4.4 step 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Chunk {
    TextCompletion {
        #[serde(flatten)]
        envelope: ChunkEnvelope,
        usage: Option<TokenUsage>,
        delta: TextDelta,
    },
    ChatCompletion {
        #[serde(flatten)]
        envelope: ChunkEnvelope,
        usage: Option<TokenUsage>,
        delta: ChatDelta,
    },
    Speech {
        #[serde(flatten)]
        envelope: ChunkEnvelope,
        usage: Option<AudioUsage>,
        delta: SpeechDelta,
    },
    Transcription {
        #[serde(flatten)]
        envelope: ChunkEnvelope,
        usage: Option<TranscriptionUsage>,
        delta: TranscriptionDelta,
    },
    Responses {
        #[serde(flatten)]
        envelope: ChunkEnvelope,
        usage: Option<TokenUsage>,
        /// Opaque provider event. Deep-cloned via serialize/deserialize at
        /// ingest by the responses reducer (§4.5).
        event: Value,
    },
}

impl Chunk {
    /// The stream kind this chunk belongs to.
    pub fn kind(&self) -> StreamKind {
        match self {
            Chunk::TextCompletion { .. } => StreamKind::TextCompletion,
            Chunk::ChatCompletion { .. } => StreamKind::ChatCompletion,
            Chunk::Speech { .. } => StreamKind::Speech,
            Chunk::Transcription { .. } => StreamKind::Transcription,
            Chunk::Responses { .. } => StreamKind::Responses,
        }
    }

    pub fn envelope(&self) -> &ChunkEnvelope {
        match self {
            Chunk::TextCompletion { envelope, .. } => envelope,
            Chunk::ChatCompletion { envelope, .. } => envelope,
            Chunk::Speech { envelope, .. } => envelope,
            Chunk::Transcription { envelope, .. } => envelope,
            Chunk::Responses { envelope, .. } => envelope,
        }
    }

    pub fn envelope_mut(&mut self) -> &mut ChunkEnvelope {
        match self {
            Chunk::TextCompletion { envelope, .. } => envelope,
            Chunk::ChatCompletion { envelope, .. } => envelope,
            Chunk::Speech { envelope, .. } => envelope,
            Chunk::Transcription { envelope, .. } => envelope,
            Chunk::Responses { envelope, .. } => envelope,
        }
    }

    /// Build an empty chunk of the given kind, used by the pool for
    /// prewarming and for resetting a returned record (§4.1).
    pub fn empty(kind: StreamKind) -> Chunk {
        match kind {
            StreamKind::TextCompletion => Chunk::TextCompletion {
                envelope: ChunkEnvelope::default(),
                usage: None,
                delta: TextDelta::default(),
            },
            StreamKind::ChatCompletion => Chunk::ChatCompletion {
                envelope: ChunkEnvelope::default(),
                usage: None,
                delta: ChatDelta::default(),
            },
            StreamKind::Speech => Chunk::Speech {
                envelope: ChunkEnvelope::default(),
                usage: None,
                delta: SpeechDelta::default(),
            },
            StreamKind::Transcription => Chunk::Transcription {
                envelope: ChunkEnvelope::default(),
                usage: None,
                delta: TranscriptionDelta {
                    delta_type: TranscriptionDeltaType::Other,
                    text_fragment: None,
                },
            },
            StreamKind::Responses => Chunk::Responses {
                envelope: ChunkEnvelope::default(),
                usage: None,
                event: Value::Null,
            },
        }
    }

    /// Clear every field in place so the record carries no residual data
    /// before it is returned to its pool (§4.1, Invariant 7). The single
    /// point of truth for reset — reducers never clear chunks themselves.
    pub fn reset(&mut self) {
        let kind = self.kind();
        *self = Chunk::empty(kind);
    }

    /// Defensively copy `source`'s payload into `self`, a chunk just taken
    /// from the pool. Panics if the kinds differ — acquiring the wrong
    /// variant for a kind is a programmer error, not a runtime condition.
    pub fn fill_from(&mut self, source: &Chunk) {
        match (self, source) {
            (
                Chunk::TextCompletion {
                    envelope,
                    usage,
                    delta,
                },
                Chunk::TextCompletion {
                    envelope: src_envelope,
                    usage: src_usage,
                    delta: src_delta,
                },
            ) => {
                *envelope = src_envelope.clone();
                *usage = src_usage.clone();
                delta.content_fragment = src_delta.content_fragment.clone();
            }
            (
                Chunk::ChatCompletion {
                    envelope,
                    usage,
                    delta,
                },
                Chunk::ChatCompletion {
                    envelope: src_envelope,
                    usage: src_usage,
                    delta: src_delta,
                },
            ) => {
                *envelope = src_envelope.clone();
                *usage = src_usage.clone();
                *delta = src_delta.clone();
            }
            (
                Chunk::Speech {
                    envelope,
                    usage,
                    delta,
                },
                Chunk::Speech {
                    envelope: src_envelope,
                    usage: src_usage,
                    delta: src_delta,
                },
            ) => {
                *envelope = src_envelope.clone();
                *usage = src_usage.clone();
                delta.audio.clear();
                delta.audio.extend_from_slice(&src_delta.audio);
            }
            (
                Chunk::Transcription {
                    envelope,
                    usage,
                    delta,
                },
                Chunk::Transcription {
                    envelope: src_envelope,
                    usage: src_usage,
                    delta: src_delta,
                },
            ) => {
                *envelope = src_envelope.clone();
                *usage = src_usage.clone();
                *delta = src_delta.clone();
            }
            (
                Chunk::Responses {
                    envelope,
                    usage,
                    event,
                },
                Chunk::Responses {
                    envelope: src_envelope,
                    usage: src_usage,
                    event: src_event,
                },
            ) => {
                *envelope = src_envelope.clone();
                *usage = src_usage.clone();
                *event = src_event.clone();
            }
            (dest, src) => panic!(
                "fill_from kind mismatch: pooled chunk is {:?}, source is {:?}",
                dest.kind(),
                src.kind()
            ),
        }
    }
}

/// `serde` helper so `Vec<u8>` audio payloads serialize compactly instead
/// of as a JSON array of numbers when a chunk round-trips through the
/// responses reducer's defensive clone path.
mod serde_bytes_vec {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let buf: Vec<u8> = Deserialize::deserialize(deserializer)?;
        Ok(buf)
    }
}
