use std::time::Duration;

use thiserror::Error;

/// Failures talking to the upstream text producer.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to connect to upstream {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out connecting to upstream {addr} after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    #[error("failed to send prompt upstream: {0}")]
    Send(#[source] std::io::Error),

    #[error("upstream read failed: {0}")]
    Read(#[source] std::io::Error),

    #[error("no data from upstream within {0:?}")]
    ReadTimeout(Duration),
}

impl SourceError {
    /// True when the connection was never established.
    pub fn is_connect(&self) -> bool {
        matches!(
            self,
            SourceError::Connect { .. } | SourceError::ConnectTimeout { .. }
        )
    }
}
