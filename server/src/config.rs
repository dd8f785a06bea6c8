// Configuration for the relay server, read from the environment

use std::str::FromStr;
use std::time::Duration;

use source_core::SourceConfig;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub rate_limit_per_minute: u32,
    pub request_timeout_secs: u64,
    pub cors_allowed_origins: Option<Vec<String>>,
    pub max_body_bytes: usize,
    pub upstream_host: String,
    pub upstream_port: u16,
    pub upstream_connect_timeout_secs: u64,
    pub upstream_read_timeout_secs: u64,
    pub upstream_read_buffer: usize,
    /// Audio chunks buffered between the pipeline and the response body.
    pub audio_channel_capacity: usize,
    /// Speak a trailing unterminated fragment when the upstream closes.
    pub speak_trailing_fragment: bool,
    pub piper_config: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            rate_limit_per_minute: 60,
            request_timeout_secs: 60,
            cors_allowed_origins: None,
            max_body_bytes: 64 * 1024,
            upstream_host: "127.0.0.1".to_string(),
            upstream_port: 8080,
            upstream_connect_timeout_secs: 5,
            upstream_read_timeout_secs: 30,
            upstream_read_buffer: 4096,
            audio_channel_capacity: 4,
            speak_trailing_fragment: false,
            piper_config: "models/voice.onnx.json".to_string(),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .ok()
            .map(|origins| {
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            });

        let speak_trailing_fragment = std::env::var("SPEAK_TRAILING_FRAGMENT")
            .ok()
            .and_then(|v| parse_flag(&v))
            .unwrap_or(defaults.speak_trailing_fragment);

        Self {
            port: env_or("PORT", defaults.port),
            rate_limit_per_minute: env_or("RATE_LIMIT_PER_MINUTE", defaults.rate_limit_per_minute),
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs),
            cors_allowed_origins,
            max_body_bytes: env_or("MAX_BODY_BYTES", defaults.max_body_bytes),
            upstream_host: std::env::var("UPSTREAM_HOST").unwrap_or(defaults.upstream_host),
            upstream_port: env_or("UPSTREAM_PORT", defaults.upstream_port),
            upstream_connect_timeout_secs: env_or(
                "UPSTREAM_CONNECT_TIMEOUT_SECS",
                defaults.upstream_connect_timeout_secs,
            ),
            upstream_read_timeout_secs: env_or(
                "UPSTREAM_READ_TIMEOUT_SECS",
                defaults.upstream_read_timeout_secs,
            ),
            upstream_read_buffer: env_or("UPSTREAM_READ_BUFFER", defaults.upstream_read_buffer),
            audio_channel_capacity: env_or(
                "AUDIO_CHANNEL_CAPACITY",
                defaults.audio_channel_capacity,
            ),
            speak_trailing_fragment,
            piper_config: std::env::var("PIPER_CONFIG").unwrap_or(defaults.piper_config),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn source_config(&self) -> SourceConfig {
        SourceConfig {
            host: self.upstream_host.clone(),
            port: self.upstream_port,
            connect_timeout: Duration::from_secs(self.upstream_connect_timeout_secs),
            read_timeout: Duration::from_secs(self.upstream_read_timeout_secs),
            read_buffer: self.upstream_read_buffer.max(1),
        }
    }
}
