use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::{SourceConnection, SourceError, TextSource};

/// Where and how to reach the upstream producer.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    /// Maximum bytes taken from the socket per read.
    pub read_buffer: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(30),
            read_buffer: 4096,
        }
    }
}

impl SourceConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Plain TCP producer: write the prompt once, then read until the peer closes.
#[derive(Debug, Clone)]
pub struct TcpTextSource {
    config: SourceConfig,
}

impl TcpTextSource {
    pub fn new(config: SourceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }
}

#[async_trait]
impl TextSource for TcpTextSource {
    async fn connect(&self) -> Result<Box<dyn SourceConnection>, SourceError> {
        let addr = self.config.addr();
        let timeout = self.config.connect_timeout;
        let stream = match tokio::time::timeout(timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(SourceError::Connect { addr, source }),
            Err(_) => return Err(SourceError::ConnectTimeout { addr, timeout }),
        };
        debug!("Connected to upstream {addr}");
        Ok(Box::new(TcpConnection {
            stream,
            buf: vec![0u8; self.config.read_buffer.max(1)],
            read_timeout: self.config.read_timeout,
        }))
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.config.addr())
    }
}

struct TcpConnection {
    stream: TcpStream,
    buf: Vec<u8>,
    read_timeout: Duration,
}

#[async_trait]
impl SourceConnection for TcpConnection {
    async fn send(&mut self, payload: &[u8]) -> Result<(), SourceError> {
        self.stream
            .write_all(payload)
            .await
            .map_err(SourceError::Send)?;
        self.stream.flush().await.map_err(SourceError::Send)
    }

    async fn receive(&mut self) -> Result<Option<Vec<u8>>, SourceError> {
        let n = tokio::time::timeout(self.read_timeout, self.stream.read(&mut self.buf))
            .await
            .map_err(|_| SourceError::ReadTimeout(self.read_timeout))?
            .map_err(SourceError::Read)?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(self.buf[..n].to_vec()))
    }
}
