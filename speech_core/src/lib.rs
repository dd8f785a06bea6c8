//! Speech side of the relay: text segmentation and audio production.

mod piper;
pub mod text;
pub mod wav;

pub use piper::PiperSynthesizer;
pub use wav::{encode_wav, WavNormalizer};

/// Converts one sentence of text into a WAV container.
///
/// Implementations are called from a blocking thread and must report failure
/// as an error rather than returning empty audio.
pub trait SpeechSynthesizer: Send + Sync {
    fn synthesize(&self, text: &str) -> anyhow::Result<Vec<u8>>;
}

/// Re-encodes synthesizer output into the container every response chunk uses.
pub trait AudioNormalizer: Send + Sync {
    fn normalize(&self, audio: &[u8]) -> anyhow::Result<AudioChunk>;
}

/// Normalized audio for one sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    pub bytes: Vec<u8>,
    pub sample_rate: u32,
    /// Number of mono samples in `bytes`.
    pub samples: usize,
}

impl AudioChunk {
    pub fn new(bytes: Vec<u8>, sample_rate: u32, samples: usize) -> Self {
        Self {
            bytes,
            sample_rate,
            samples,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.samples as u64 * 1000) / self.sample_rate as u64
    }
}
