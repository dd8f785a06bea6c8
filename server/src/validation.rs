use axum::http::{header, HeaderMap};

use crate::error::ApiError;

pub const NOT_JSON: &str = "Request must be JSON";

/// True for `application/json` and any `application/*+json` media type.
fn is_json_content_type(headers: &HeaderMap) -> bool {
    let Some(value) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };
    let mime = value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
}

/// Accept any well-formed JSON document sent with a JSON content type.
///
/// No schema is enforced; whatever parses is forwarded upstream.
pub fn parse_json_request(headers: &HeaderMap, body: &[u8]) -> Result<serde_json::Value, ApiError> {
    if !is_json_content_type(headers) {
        return Err(ApiError::BadRequest(NOT_JSON.to_string()));
    }
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!("Rejecting malformed JSON body: {e}");
        ApiError::BadRequest(NOT_JSON.to_string())
    })
}
