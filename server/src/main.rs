use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use relay_server::{build_router, config::ServerConfig, metrics::AppMetrics, AppState};
use source_core::TcpTextSource;
use speech_core::{PiperSynthesizer, WavNormalizer};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let _ = dotenv::dotenv();

    async_main().await
}

async fn async_main() -> anyhow::Result<()> {
    info!("Starting text-to-speech relay...");

    let config = ServerConfig::from_env();

    info!("Loading Piper voice from {}", config.piper_config);
    let synthesizer = PiperSynthesizer::from_config_path(&config.piper_config)
        .with_context(|| format!("Could not load voice {}. Set PIPER_CONFIG.", config.piper_config))?;

    let source = TcpTextSource::new(config.source_config());
    info!(
        "Server configuration loaded: port={}, upstream={}, read_timeout={}s, rate_limit={}/min",
        config.port,
        source.config().addr(),
        config.upstream_read_timeout_secs,
        config.rate_limit_per_minute
    );
    if config.speak_trailing_fragment {
        info!("Trailing unterminated fragments will be spoken");
    }

    let state = AppState {
        source: Arc::new(source),
        synthesizer: Arc::new(synthesizer),
        normalizer: Arc::new(WavNormalizer),
        metrics: AppMetrics::new(),
        config: config.clone(),
    };
    let app = build_router(state)?;

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!("Failed to bind {addr}: {e}. Try a different PORT.")
    })?;

    info!("Server listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
