//! Client side of the upstream text producer.
//!
//! The wire protocol has no framing: the caller writes its prompt once and
//! then reads raw text bytes until the producer closes the connection.

mod error;
mod tcp;

use async_trait::async_trait;

pub use error::SourceError;
pub use tcp::{SourceConfig, TcpTextSource};

/// Opens connections to a text producer.
#[async_trait]
pub trait TextSource: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn SourceConnection>, SourceError>;

    /// Human readable location, for logs.
    fn describe(&self) -> String;
}

/// One open session with the producer. Dropping it closes the connection.
#[async_trait]
pub trait SourceConnection: Send {
    /// Write the whole payload.
    async fn send(&mut self, payload: &[u8]) -> Result<(), SourceError>;

    /// Next chunk of bytes, or `None` once the producer has closed.
    async fn receive(&mut self) -> Result<Option<Vec<u8>>, SourceError>;
}

/// Serialize a request payload the way the producer expects it: compact JSON,
/// UTF-8, no trailing newline.
pub fn encode_payload(payload: &serde_json::Value) -> Vec<u8> {
    payload.to_string().into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_payload_is_compact_json() {
        let payload = serde_json::json!({ "prompt": "Tell me a story", "n": 1 });
        let bytes = encode_payload(&payload);
        let text = String::from_utf8(bytes).unwrap();
        assert!(!text.contains('\n'));
        let back: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_encode_payload_scalar() {
        assert_eq!(encode_payload(&serde_json::json!("hi")), b"\"hi\"");
    }
}
