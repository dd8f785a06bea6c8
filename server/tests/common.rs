//! Common utilities for integration tests

#![allow(dead_code)]

use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use relay_server::{build_router, config::ServerConfig, metrics::AppMetrics, AppState};
use source_core::TcpTextSource;
use speech_core::{encode_wav, SpeechSynthesizer, WavNormalizer};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Synthesizer that renders one 8 kHz sample per character and remembers
/// what it was asked to say.
#[derive(Default)]
pub struct FakeSynth {
    pub spoken: Mutex<Vec<String>>,
    pub fail_on: Option<&'static str>,
}

impl SpeechSynthesizer for FakeSynth {
    fn synthesize(&self, text: &str) -> anyhow::Result<Vec<u8>> {
        if self.fail_on.is_some_and(|f| text.contains(f)) {
            anyhow::bail!("engine unavailable");
        }
        self.spoken.lock().unwrap().push(text.to_string());
        encode_wav(&vec![0.2; text.chars().count()], 8000)
    }
}

impl FakeSynth {
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

/// A stand-in for the upstream producer: accepts one connection, captures
/// the prompt, writes each chunk as a separate write, then closes.
pub struct FakeUpstream {
    pub addr: SocketAddr,
    pub prompt: oneshot::Receiver<Vec<u8>>,
}

pub async fn spawn_upstream(chunks: Vec<&'static str>) -> FakeUpstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (prompt_tx, prompt_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut prompt = vec![0u8; 4096];
        let n = socket.read(&mut prompt).await.unwrap();
        prompt.truncate(n);
        let _ = prompt_tx.send(prompt);

        for chunk in chunks {
            socket.write_all(chunk.as_bytes()).await.unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(30)).await;
        }
        // dropping the socket closes the stream
    });

    FakeUpstream {
        addr,
        prompt: prompt_rx,
    }
}

/// An upstream serving every connection it accepts. Each connection gets the
/// script whose key appears in its prompt.
pub async fn spawn_routing_upstream(
    scripts: Vec<(&'static str, Vec<&'static str>)>,
) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let scripts = Arc::new(scripts);

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let scripts = scripts.clone();
            tokio::spawn(async move {
                let mut prompt = vec![0u8; 4096];
                let n = socket.read(&mut prompt).await.unwrap();
                let prompt = String::from_utf8_lossy(&prompt[..n]).into_owned();
                let chunks = scripts
                    .iter()
                    .find(|(key, _)| prompt.contains(key))
                    .map(|(_, chunks)| chunks.clone())
                    .unwrap_or_default();
                for chunk in chunks {
                    socket.write_all(chunk.as_bytes()).await.unwrap();
                    socket.flush().await.unwrap();
                    tokio::time::sleep(Duration::from_millis(30)).await;
                }
            });
        }
    });

    addr
}

/// Address on which nothing is listening.
pub async fn closed_port_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

pub fn test_config(upstream: SocketAddr) -> ServerConfig {
    ServerConfig {
        upstream_host: upstream.ip().to_string(),
        upstream_port: upstream.port(),
        upstream_connect_timeout_secs: 2,
        upstream_read_timeout_secs: 5,
        rate_limit_per_minute: 6000,
        ..ServerConfig::default()
    }
}

/// Create a test app instance wired to `upstream` and `synth`.
pub fn create_test_app(config: ServerConfig, synth: Arc<FakeSynth>) -> (Router, AppMetrics) {
    let metrics = AppMetrics::new();
    let state = AppState {
        source: Arc::new(TcpTextSource::new(config.source_config())),
        synthesizer: synth,
        normalizer: Arc::new(WavNormalizer),
        metrics: metrics.clone(),
        config,
    };
    (build_router(state).expect("router"), metrics)
}

/// Split a body made of back-to-back WAV files into the sample count of each.
pub fn split_wavs(mut body: &[u8]) -> Vec<usize> {
    let mut out = Vec::new();
    while !body.is_empty() {
        assert!(body.len() >= 8, "trailing garbage in body");
        assert_eq!(&body[0..4], b"RIFF");
        let riff_size = u32::from_le_bytes([body[4], body[5], body[6], body[7]]) as usize;
        let (wav, rest) = body.split_at(riff_size + 8);
        let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.bits_per_sample, 16);
        out.push(reader.len() as usize);
        body = rest;
    }
    out
}
