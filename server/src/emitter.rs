//! Synthesis and delivery of one sentence's audio.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use speech_core::{AudioNormalizer, SpeechSynthesizer};
use tokio::sync::mpsc;
use tracing::debug;

use crate::metrics::RelayMetrics;
use crate::pipeline::PipelineError;

/// Items carried to the response body. An `Err` ends the body abnormally.
pub type BodyItem = Result<Bytes, PipelineError>;

/// What was written for one sentence. The audio itself is owned by the
/// response body once sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Emitted {
    pub bytes: usize,
    pub duration_ms: u64,
}

/// Turns sentences into normalized audio and pushes each one to the response
/// as soon as it is ready.
pub struct AudioEmitter {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    normalizer: Arc<dyn AudioNormalizer>,
    tx: mpsc::Sender<BodyItem>,
    metrics: RelayMetrics,
}

impl AudioEmitter {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        normalizer: Arc<dyn AudioNormalizer>,
        tx: mpsc::Sender<BodyItem>,
        metrics: RelayMetrics,
    ) -> Self {
        Self {
            synthesizer,
            normalizer,
            tx,
            metrics,
        }
    }

    /// Resolves once the response body has been dropped.
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    /// Synthesize `sentence`, normalize it and send it downstream.
    ///
    /// Gives up with [`PipelineError::Cancelled`] as soon as the receiver is
    /// gone; the blocking synthesis call itself runs to completion in the
    /// background but its output is discarded.
    pub async fn emit(&self, sentence: &str) -> Result<Emitted, PipelineError> {
        let started = Instant::now();
        let synthesizer = self.synthesizer.clone();
        let normalizer = self.normalizer.clone();
        let text = sentence.to_string();

        let render = tokio::task::spawn_blocking(move || {
            let raw = synthesizer
                .synthesize(&text)
                .map_err(PipelineError::Synthesis)?;
            normalizer
                .normalize(&raw)
                .map_err(PipelineError::Normalization)
        });

        let chunk = tokio::select! {
            biased;
            _ = self.tx.closed() => return Err(PipelineError::Cancelled),
            joined = render => joined.map_err(|e| PipelineError::TaskFailed(e.to_string()))??,
        };

        let emitted = Emitted {
            bytes: chunk.bytes.len(),
            duration_ms: chunk.duration_ms(),
        };

        self.tx
            .send(Ok(Bytes::from(chunk.bytes)))
            .await
            .map_err(|_| PipelineError::Cancelled)?;

        self.metrics
            .record_emitted(emitted.bytes, emitted.duration_ms);
        debug!(
            "Emitted {} bytes ({} ms audio) in {} ms",
            emitted.bytes,
            emitted.duration_ms,
            started.elapsed().as_millis()
        );
        Ok(emitted)
    }

    /// Terminate the response body with an error. Audio already sent stays sent.
    pub async fn fail(&self, error: PipelineError) {
        let _ = self.tx.send(Err(error)).await;
    }
}
