use std::io::Cursor;

use anyhow::Context;

use crate::{AudioChunk, AudioNormalizer};

/// Encode f32 samples in [-1.0, 1.0] as a 16-bit PCM mono WAV container.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> anyhow::Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    // WAV header (44 bytes) + 2 bytes per sample
    let mut cursor = Cursor::new(Vec::<u8>::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| anyhow::anyhow!("wav write err: {e}"))?;

        const I16_MAX_F32: f32 = i16::MAX as f32;
        for &s in samples {
            let v = (s.clamp(-1.0, 1.0) * I16_MAX_F32).round() as i16;
            writer
                .write_sample(v)
                .map_err(|e| anyhow::anyhow!("wav sample err: {e}"))?;
        }
        writer
            .finalize()
            .map_err(|e| anyhow::anyhow!("wav finalize err: {e}"))?;
    }

    Ok(cursor.into_inner())
}

/// Decode any PCM or float WAV into mono f32 samples and its sample rate.
///
/// Multi-channel input is down-mixed by averaging each frame.
pub fn decode_wav_mono(bytes: &[u8]) -> anyhow::Result<(Vec<f32>, u32)> {
    let mut reader =
        hound::WavReader::new(Cursor::new(bytes)).context("audio is not a WAV container")?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .context("failed to read float samples")?,
        hound::SampleFormat::Int => {
            // Full-scale positive value, matching the factor used by `encode_wav`.
            let scale = ((1i64 << spec.bits_per_sample.saturating_sub(1)) - 1).max(1) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .context("failed to read integer samples")?
        }
    };

    let mono = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    Ok((mono, spec.sample_rate))
}

/// Re-encodes synthesizer output as 16-bit PCM mono WAV at its own sample rate,
/// so every chunk in a response shares one container layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavNormalizer;

impl AudioNormalizer for WavNormalizer {
    fn normalize(&self, audio: &[u8]) -> anyhow::Result<AudioChunk> {
        let (samples, sample_rate) = decode_wav_mono(audio)?;
        let bytes = encode_wav(&samples, sample_rate)?;
        Ok(AudioChunk::new(bytes, sample_rate, samples.len()))
    }
}
