//! Transcription (audio-in → text) reducer (§4.5 "Transcription reducer").

use crate::accumulator::chunk::{Chunk, TranscriptionDeltaType, TranscriptionUsage};
use crate::accumulator::record::Payload;

pub struct TranscriptionReduction {
    pub payload: Payload,
    pub usage: Option<TranscriptionUsage>,
    pub cost: Option<f64>,
    pub cache_debug: Option<serde_json::Value>,
    pub finish_reason: Option<String>,
}

/// Concatenate only the delta texts whose type tag is
/// `transcript.text.delta`; every other event contributes no characters
/// (§4.5, P7). Usage is taken from the last chunk's usage field.
pub fn reduce(chunks: &[Chunk]) -> TranscriptionReduction {
    let mut text = String::new();
    let mut usage = None;
    let mut cost = None;
    let mut cache_debug = None;
    let mut finish_reason = None;

    for chunk in chunks {
        let Chunk::Transcription {
            envelope,
            usage: chunk_usage,
            delta,
        } = chunk
        else {
            continue;
        };

        if delta.delta_type == TranscriptionDeltaType::TranscriptTextDelta {
            if let Some(fragment) = &delta.text_fragment {
                text.push_str(fragment);
            }
        }

        if chunk_usage.is_some() {
            usage = chunk_usage.clone();
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

    TranscriptionReduction {
        payload: Payload::Transcription { text },
        usage,
        cost,
        cache_debug,
        finish_reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::chunk::{ChunkEnvelope, TranscriptionDelta};

    fn transcription_chunk(
        delta_type: TranscriptionDeltaType,
        text: &str,
        usage: Option<TranscriptionUsage>,
    ) -> Chunk {
        Chunk::Transcription {
            envelope: ChunkEnvelope::default(),
            usage,
            delta: TranscriptionDelta {
                delta_type,
                text_fragment: Some(text.to_string()),
            },
        }
    }

    #[test]
    fn non_text_delta_events_contribute_no_characters() {
        let chunks = vec![
            transcription_chunk(TranscriptionDeltaType::TranscriptTextDelta, "Hel", None),
            transcription_chunk(TranscriptionDeltaType::Other, "ignored", None),
            transcription_chunk(TranscriptionDeltaType::TranscriptTextDelta, "lo", None),
            transcription_chunk(
                TranscriptionDeltaType::Other,
                "",
                Some(TranscriptionUsage {
                    input_tokens: 5,
                    output_tokens: 2,
                    total_tokens: 7,
                }),
            ),
        ];

        let reduction = reduce(&chunks);
        match reduction.payload {
            Payload::Transcription { text } => assert_eq!(text, "Hello"),
            _ => panic!("expected transcription payload"),
        }
        assert_eq!(reduction.usage.unwrap().total_tokens, 7);
    }
}
