use std::{
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::Context;
use piper_rs::synth::{PiperSpeechStreamParallel, PiperSpeechSynthesizer};
use tracing::{debug, info};

use crate::wav::encode_wav;
use crate::SpeechSynthesizer;

/// Speech synthesis backed by a local Piper voice.
pub struct PiperSynthesizer {
    config_path: PathBuf,
    sample_rate: u32,
    synth: Mutex<PiperSpeechSynthesizer>,
}

// PiperSpeechSynthesizer doesn't implement Debug
impl std::fmt::Debug for PiperSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PiperSynthesizer")
            .field("config_path", &self.config_path)
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

impl PiperSynthesizer {
    /// Load the voice described by a Piper `*.onnx.json` config.
    pub fn from_config_path<P: AsRef<Path>>(cfg_path: P) -> anyhow::Result<Self> {
        let cfg_path = cfg_path.as_ref();
        let sample_rate = read_sample_rate(cfg_path)?;
        let model = piper_rs::from_config_path(cfg_path)
            .map_err(|e| anyhow::anyhow!("piper load error: {e}"))?;
        let synth = PiperSpeechSynthesizer::new(model)?;
        info!(
            "Loaded Piper voice {} ({} Hz)",
            cfg_path.display(),
            sample_rate
        );
        Ok(Self {
            config_path: cfg_path.to_path_buf(),
            sample_rate,
            synth: Mutex::new(synth),
        })
    }
}

impl SpeechSynthesizer for PiperSynthesizer {
    fn synthesize(&self, text: &str) -> anyhow::Result<Vec<u8>> {
        let synth = self
            .synth
            .lock()
            .map_err(|_| anyhow::anyhow!("Synthesizer lock poisoned by an earlier panic"))?;

        let iter: PiperSpeechStreamParallel = synth
            .synthesize_parallel(text.to_string(), None)
            .map_err(|e| anyhow::anyhow!("piper synth error: {e}"))?;

        let mut samples: Vec<f32> = Vec::new();
        for part in iter {
            samples.extend(
                part.map_err(|e| anyhow::anyhow!("chunk error: {e}"))?
                    .into_vec(),
            );
        }
        if samples.is_empty() {
            anyhow::bail!("piper produced no audio for {} chars of text", text.len());
        }
        debug!("Synthesized {} samples", samples.len());

        encode_wav(&samples, self.sample_rate)
    }
}

/// Read `audio.sample_rate` from a Piper voice config.
fn read_sample_rate(cfg_path: &Path) -> anyhow::Result<u32> {
    let text = fs::read_to_string(cfg_path)
        .with_context(|| format!("Failed to read config file: {}", cfg_path.display()))?;
    parse_sample_rate(&text)
}

fn parse_sample_rate(config_json: &str) -> anyhow::Result<u32> {
    let json: serde_json::Value =
        serde_json::from_str(config_json).context("Config file is not valid JSON")?;
    let sample_rate = json
        .get("audio")
        .and_then(|a| a.get("sample_rate"))
        .and_then(|sr| sr.as_u64())
        .ok_or_else(|| anyhow::anyhow!("Missing or invalid 'audio.sample_rate' in config"))?;
    u32::try_from(sample_rate).context("sample rate out of range")
}
