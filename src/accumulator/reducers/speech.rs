//! Speech (audio-out) reducer (§4.5 "Speech reducer").

use crate::accumulator::chunk::{AudioUsage, Chunk};
use crate::accumulator::record::Payload;

pub struct SpeechReduction {
    pub payload: Payload,
    pub usage: Option<AudioUsage>,
    pub cost: Option<f64>,
    pub cache_debug: Option<serde_json::Value>,
    pub finish_reason: Option<String>,
}

/// Concatenate audio byte slices from every chunk's delta, in arrival
/// order (§4.5, P6). Usage comes from the last chunk that carries it.
pub fn reduce(chunks: &[Chunk]) -> SpeechReduction {
    let mut audio = Vec::new();
    let mut usage = None;
    let mut cost = None;
    let mut cache_debug = None;
    let mut finish_reason = None;

    for chunk in chunks {
        let Chunk::Speech {
            envelope,
            usage: chunk_usage,
            delta,
        } = chunk
        else {
            continue;
        };

        audio.extend_from_slice(&delta.audio);

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

    SpeechReduction {
        payload: Payload::Speech { audio },
        usage,
        cost,
        cache_debug,
        finish_reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::chunk::{ChunkEnvelope, SpeechDelta};

    fn speech_chunk(audio: &[u8], usage: Option<AudioUsage>) -> Chunk {
        Chunk::Speech {
            envelope: ChunkEnvelope::default(),
            usage,
            delta: SpeechDelta {
                audio: audio.to_vec(),
            },
        }
    }

    #[test]
    fn audio_bytes_concatenate_in_order() {
        let chunks = vec![
            speech_chunk(&[0x01, 0x02, 0x03], None),
            speech_chunk(
                &[0x04, 0x05],
                Some(AudioUsage {
                    input_tokens: 10,
                    output_tokens: 20,
                    total_tokens: 30,
                }),
            ),
        ];

        let reduction = reduce(&chunks);
        match reduction.payload {
            Payload::Speech { audio } => {
                assert_eq!(audio, vec![0x01, 0x02, 0x03, 0x04, 0x05])
            }
            _ => panic!("expected speech payload"),
        }
        assert_eq!(reduction.usage.unwrap().total_tokens, 30);
    }
}
