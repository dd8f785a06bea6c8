pub mod config;
pub mod emitter;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod validation;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use source_core::TextSource;
use speech_core::{AudioNormalizer, SpeechSynthesizer};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tower::ServiceBuilder;
use tower_governor::{governor::GovernorConfigBuilder, key_extractor::GlobalKeyExtractor, GovernorLayer};
use tower_http::{
    cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::ServerConfig;
use crate::emitter::AudioEmitter;
use crate::error::ApiError;
use crate::metrics::{AppMetrics, MetricsResponse};
use crate::pipeline::{PipelineOptions, StreamPipeline};
use crate::validation::parse_json_request;

const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn TextSource>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub normalizer: Arc<dyn AudioNormalizer>,
    pub metrics: AppMetrics,
    pub config: ServerConfig,
}

impl AppState {
    fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            speak_trailing_fragment: self.config.speak_trailing_fragment,
        }
    }
}

/// Request ID middleware for tracing
async fn add_request_id(mut request: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    // A v4 UUID is always a valid header value.
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        request.headers_mut().insert(REQUEST_ID_HEADER, value.clone());
        let mut response = next.run(request).await;
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
        return response;
    }
    next.run(request).await
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST, axum::http::Method::OPTIONS])
        .allow_headers(tower_http::cors::Any)
        .allow_credentials(false);

    let Some(allowed_origins) = &config.cors_allowed_origins else {
        warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (development mode)");
        return base.allow_origin(tower_http::cors::Any);
    };

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();
    if origins.is_empty() {
        warn!("CORS_ALLOWED_ORIGINS is empty, falling back to permissive CORS");
        base.allow_origin(tower_http::cors::Any)
    } else {
        info!("CORS configured for {} origin(s)", origins.len());
        base.allow_origin(tower_http::cors::AllowOrigin::list(origins))
    }
}

/// Build the full application router with its middleware stack.
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let config = &state.config;

    // Global key: every caller shares one budget, which also behaves behind proxies.
    // The governor period is the interval between refills, not a rate.
    let per_minute = config.rate_limit_per_minute.max(1);
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(refill_interval_ms(per_minute))
            .burst_size(per_minute)
            .key_extractor(GlobalKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("invalid rate limit configuration"))?,
    );

    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(GovernorLayer::new(governor_conf))
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(cors_layer(config))
        .into_inner();

    let api = Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(health_check))
        .route("/get_audio", post(get_audio))
        .route("/metrics", get(metrics_endpoint));

    Ok(Router::new()
        .merge(api.clone()) // root paths
        .nest("/api", api) // /api prefix
        .fallback(not_found)
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(axum::middleware::from_fn(add_request_id))
        .layer(middleware_stack)
        .with_state(state))
}

/// Milliseconds between token refills for a budget of `per_minute` requests.
fn refill_interval_ms(per_minute: u32) -> u64 {
    (60_000 / u64::from(per_minute.max(1))).max(1)
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("No route for {uri}"))
}

pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn metrics_endpoint(State(state): State<AppState>) -> Json<MetricsResponse> {
    Json(state.metrics.snapshot())
}

/// Relay the JSON body to the upstream producer and stream back one WAV chunk
/// per completed sentence.
pub async fn get_audio(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    state.metrics.relay.requests.fetch_add(1, Ordering::Relaxed);
    let request_id = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let span = info_span!("get_audio", request_id = %request_id);

    let payload = parse_json_request(&headers, &body).inspect_err(|_| {
        state.metrics.relay.bad_requests.fetch_add(1, Ordering::Relaxed);
    })?;
    span.in_scope(|| debug!("Received JSON: {payload}"));

    let mut pipeline = StreamPipeline::new(
        state.source.clone(),
        state.pipeline_options(),
        state.metrics.clone(),
    );
    let connection = pipeline
        .connect(&payload)
        .instrument(span.clone())
        .await?;

    let (tx, rx) = mpsc::channel(state.config.audio_channel_capacity.max(1));
    let emitter = AudioEmitter::new(
        state.synthesizer.clone(),
        state.normalizer.clone(),
        tx,
        state.metrics.relay.clone(),
    );
    tokio::spawn(pipeline.stream(connection, emitter).instrument(span));

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "audio/wav")
        .header(header::TRANSFER_ENCODING, "chunked")
        .body(Body::from_stream(ReceiverStream::new(rx)))
        .map_err(|e| ApiError::InternalError(format!("failed to build response: {e}")))?;
    Ok(response.into_response())
}
