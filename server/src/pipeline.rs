//! Per-request relay from upstream text to streamed audio.
//!
//! ```text
//! Connecting -> Streaming -> Completing -> Closed
//!                   \-> Failed ------------^
//! ```
//!
//! Each invocation owns its connection and text buffer; nothing here is
//! shared between requests except metrics.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use source_core::{encode_payload, SourceConnection, SourceError, TextSource};
use speech_core::text::{clean, TextBuffer, Utf8ChunkDecoder};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::emitter::AudioEmitter;
use crate::metrics::AppMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Connecting,
    Streaming,
    Completing,
    Failed,
    Closed,
}

/// Failures after the connection is established. Once audio has started
/// flowing these can only truncate the response.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("upstream read failed: {0}")]
    UpstreamRead(#[source] SourceError),

    #[error("upstream timed out: {0}")]
    UpstreamTimeout(#[source] SourceError),

    #[error("speech synthesis failed: {0}")]
    Synthesis(#[source] anyhow::Error),

    #[error("audio normalization failed: {0}")]
    Normalization(#[source] anyhow::Error),

    #[error("synthesis task failed: {0}")]
    TaskFailed(String),

    #[error("client disconnected")]
    Cancelled,
}

impl From<SourceError> for PipelineError {
    fn from(e: SourceError) -> Self {
        match e {
            SourceError::ReadTimeout(_) => PipelineError::UpstreamTimeout(e),
            other => PipelineError::UpstreamRead(other),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    /// Speak text left without terminal punctuation when the upstream closes.
    pub speak_trailing_fragment: bool,
}

/// Counters for one stream.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StreamSummary {
    pub sentences: usize,
    pub audio_bytes: usize,
    /// Unterminated text discarded at the end of the stream.
    pub dropped_fragment: Option<String>,
}

/// How a stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    /// The upstream closed and every complete sentence was delivered.
    Completed(StreamSummary),
    /// The response body was dropped before the upstream finished.
    Cancelled(StreamSummary),
    /// The body was terminated with an error after `summary` was delivered.
    Failed { summary: StreamSummary, reason: String },
}

pub struct StreamPipeline {
    source: Arc<dyn TextSource>,
    options: PipelineOptions,
    metrics: AppMetrics,
    state: PipelineState,
    started: Instant,
    first_audio_recorded: bool,
}

impl StreamPipeline {
    pub fn new(source: Arc<dyn TextSource>, options: PipelineOptions, metrics: AppMetrics) -> Self {
        Self {
            source,
            options,
            metrics,
            state: PipelineState::Connecting,
            started: Instant::now(),
            first_audio_recorded: false,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    fn transition(&mut self, next: PipelineState) {
        debug!("Pipeline {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Open the upstream connection and forward the request payload.
    ///
    /// Nothing has been sent to the client yet, so failures here are still
    /// reported with an HTTP status by the caller.
    pub async fn connect(
        &mut self,
        payload: &serde_json::Value,
    ) -> Result<Box<dyn SourceConnection>, SourceError> {
        let result = async {
            let mut connection = self.source.connect().await?;
            connection.send(&encode_payload(payload)).await?;
            Ok::<_, SourceError>(connection)
        }
        .await;

        if let Err(e) = &result {
            warn!("Upstream {} unavailable: {e}", self.source.describe());
            self.metrics
                .relay
                .upstream_connect_failures
                .fetch_add(1, Ordering::Relaxed);
            self.transition(PipelineState::Failed);
            self.transition(PipelineState::Closed);
        }
        result
    }

    /// Drive the stream to its end, consuming the connection.
    ///
    /// The connection is dropped before this returns on every path. Errors
    /// are forwarded into the response body, not returned.
    pub async fn stream(
        mut self,
        mut connection: Box<dyn SourceConnection>,
        emitter: AudioEmitter,
    ) -> StreamEnd {
        self.transition(PipelineState::Streaming);
        let relay = self.metrics.relay.clone();
        relay.stream_started();

        let mut summary = StreamSummary::default();
        let result = self
            .pump(connection.as_mut(), &emitter, &mut summary)
            .await;
        drop(connection);

        let end = match result {
            Ok(()) => {
                relay.completed_streams.fetch_add(1, Ordering::Relaxed);
                info!(
                    "Stream complete: {} sentence(s), {} bytes in {:.2}s",
                    summary.sentences,
                    summary.audio_bytes,
                    self.started.elapsed().as_secs_f64()
                );
                StreamEnd::Completed(summary)
            }
            Err(PipelineError::Cancelled) => {
                relay.cancelled_streams.fetch_add(1, Ordering::Relaxed);
                info!(
                    "Client went away after {} sentence(s); stopping",
                    summary.sentences
                );
                StreamEnd::Cancelled(summary)
            }
            Err(e) => {
                match &e {
                    PipelineError::UpstreamRead(_) | PipelineError::UpstreamTimeout(_) => {
                        relay.upstream_read_failures.fetch_add(1, Ordering::Relaxed);
                    }
                    _ => {
                        relay.synthesis_failures.fetch_add(1, Ordering::Relaxed);
                    }
                }
                warn!(
                    "Stream failed after {} sentence(s), response truncated: {e}",
                    summary.sentences
                );
                self.transition(PipelineState::Failed);
                let reason = e.to_string();
                emitter.fail(e).await;
                StreamEnd::Failed { summary, reason }
            }
        };

        relay.stream_finished();
        self.transition(PipelineState::Closed);
        end
    }

    async fn pump(
        &mut self,
        connection: &mut dyn SourceConnection,
        emitter: &AudioEmitter,
        summary: &mut StreamSummary,
    ) -> Result<(), PipelineError> {
        let mut decoder = Utf8ChunkDecoder::new();
        let mut buffer = TextBuffer::new();

        loop {
            let read = tokio::select! {
                biased;
                _ = emitter.closed() => return Err(PipelineError::Cancelled),
                read = connection.receive() => read?,
            };
            let Some(bytes) = read else {
                break;
            };
            let text = decoder.decode(&bytes);
            self.ingest(&text, &mut buffer, emitter, summary).await?;
        }

        let tail = decoder.finish();
        if !tail.is_empty() {
            self.ingest(&tail, &mut buffer, emitter, summary).await?;
        }

        self.transition(PipelineState::Completing);
        if let Some(fragment) = buffer.take_fragment() {
            if self.options.speak_trailing_fragment {
                debug!("Speaking trailing fragment ({} chars)", fragment.len());
                self.dispatch(&fragment, emitter, summary).await?;
            } else {
                debug!("Dropping unterminated fragment ({} chars)", fragment.len());
                self.metrics
                    .relay
                    .dropped_fragments
                    .fetch_add(1, Ordering::Relaxed);
                summary.dropped_fragment = Some(fragment);
            }
        }
        Ok(())
    }

    /// Clean one decoded read, merge it and speak every sentence it completes.
    async fn ingest(
        &mut self,
        raw: &str,
        buffer: &mut TextBuffer,
        emitter: &AudioEmitter,
        summary: &mut StreamSummary,
    ) -> Result<(), PipelineError> {
        let chunk = clean(raw);
        if chunk.is_empty() {
            return Ok(());
        }

        let pushed = buffer.push(&chunk);
        debug!(
            "Merged {} chars as {:?}, {} sentence(s) ready",
            chunk.len(),
            pushed.decision,
            pushed.sentences.len()
        );
        for sentence in &pushed.sentences {
            self.dispatch(sentence, emitter, summary).await?;
        }
        Ok(())
    }

    async fn dispatch(
        &mut self,
        sentence: &str,
        emitter: &AudioEmitter,
        summary: &mut StreamSummary,
    ) -> Result<(), PipelineError> {
        debug!("Synthesizing: {sentence:?}");
        let emitted = emitter.emit(sentence).await?;
        summary.sentences += 1;
        summary.audio_bytes += emitted.bytes;
        if !self.first_audio_recorded {
            self.first_audio_recorded = true;
            self.metrics
                .first_audio
                .record(self.started.elapsed().as_millis() as u64);
        }
        Ok(())
    }
}
