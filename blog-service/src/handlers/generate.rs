//! `POST /generate`: validate, render, call the provider, map the outcome.

use crate::models::{BlogRequest, GenerateResponse, ValidationError};
use crate::services::metrics;
use crate::services::providers::{FinishReason, GenerationParams, ProviderError};
use crate::services::render_prompt;
use crate::startup::AppState;
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use service_core::error::AppError;
use thiserror::Error;

/// Upper bound on provider output for every request.
pub const MAX_OUTPUT_TOKENS: u32 = 2048;

/// Largest `/generate` body buffered before the request is refused.
pub const MAX_REQUEST_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Client-facing message for any provider failure.
pub const GENERATION_FAILED_MESSAGE: &str = "Error generating text";

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("Missing JSON in request")]
    MalformedRequest,

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Error generating text")]
    Provider(#[from] ProviderError),
}

impl GenerateError {
    fn outcome(&self) -> &'static str {
        match self {
            GenerateError::MalformedRequest => "malformed_request",
            GenerateError::PayloadTooLarge => "payload_too_large",
            GenerateError::Validation(_) => "validation_error",
            GenerateError::Provider(_) => "provider_error",
        }
    }
}

impl From<GenerateError> for AppError {
    fn from(err: GenerateError) -> Self {
        match err {
            GenerateError::MalformedRequest | GenerateError::Validation(_) => {
                AppError::BadRequest(err.to_string())
            }
            GenerateError::PayloadTooLarge => AppError::PayloadTooLarge(err.to_string()),
            GenerateError::Provider(source) => AppError::Opaque {
                message: GENERATION_FAILED_MESSAGE.to_string(),
                source: anyhow::Error::new(source),
            },
        }
    }
}

impl From<BytesRejection> for GenerateError {
    fn from(rejection: BytesRejection) -> Self {
        tracing::debug!(reason = %rejection.body_text(), "Could not read request body");
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            GenerateError::PayloadTooLarge
        } else {
            GenerateError::MalformedRequest
        }
    }
}

impl IntoResponse for GenerateError {
    fn into_response(self) -> Response {
        AppError::from(self).into_response()
    }
}

/// `application/json` or any `application/*+json`, parameters ignored.
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

fn parse_body(headers: &HeaderMap, body: &[u8]) -> Result<Value, GenerateError> {
    if !is_json_content_type(headers) {
        return Err(GenerateError::MalformedRequest);
    }

    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(error = %e, "Rejected request body that is not valid JSON");
        GenerateError::MalformedRequest
    })
}

async fn run_generation(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<GenerateResponse, GenerateError> {
    let payload = parse_body(headers, body)?;
    let request = BlogRequest::from_json(&payload)?;
    let prompt = render_prompt(&request);

    let params = GenerationParams {
        max_tokens: Some(MAX_OUTPUT_TOKENS),
    };

    let response = state
        .text_provider
        .generate(&prompt, &params)
        .await
        .map_err(|e| {
            tracing::error!(
                provider = state.text_provider.name(),
                error = %e,
                "Exception while generating text"
            );
            e
        })?;

    if response.finish_reason == FinishReason::Length {
        tracing::warn!(
            blog_length = request.blog_length,
            max_tokens = MAX_OUTPUT_TOKENS,
            "Completion truncated at token limit"
        );
    }
    metrics::record_tokens(response.input_tokens, response.output_tokens);

    Ok(GenerateResponse::from_completion(&response.text))
}

/// Generate a blog post from a structured request.
///
/// Rate limiting is applied by middleware before this handler runs.
pub async fn generate(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<GenerateResponse>, GenerateError> {
    let result = match body {
        Ok(body) => run_generation(&state, &headers, &body).await,
        Err(rejection) => Err(GenerateError::from(rejection)),
    };

    metrics::record_generation(match &result {
        Ok(_) => "success",
        Err(e) => e.outcome(),
    });

    result.map(Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        headers
    }

    #[test]
    fn recognises_json_content_types() {
        assert!(is_json_content_type(&headers("application/json")));
        assert!(is_json_content_type(&headers("application/json; charset=utf-8")));
        assert!(is_json_content_type(&headers("Application/JSON")));
        assert!(is_json_content_type(&headers("application/merge-patch+json")));
        assert!(!is_json_content_type(&headers("text/plain")));
        assert!(!is_json_content_type(&headers("application/x-www-form-urlencoded")));
        assert!(!is_json_content_type(&HeaderMap::new()));
    }

    #[test]
    fn json_header_with_invalid_body_is_malformed() {
        let err = parse_body(&headers("application/json"), b"{not json").unwrap_err();
        assert!(matches!(err, GenerateError::MalformedRequest));
        assert_eq!(err.to_string(), "Missing JSON in request");
    }

    #[test]
    fn validation_message_is_prefixed() {
        let err = GenerateError::from(ValidationError::InvalidTone);
        assert_eq!(err.to_string(), "Validation failed: Tone should be alphanumeric");
    }

    #[test]
    fn oversized_body_maps_to_payload_too_large() {
        let err = AppError::from(GenerateError::PayloadTooLarge);
        assert!(matches!(err, AppError::PayloadTooLarge(ref msg) if msg == "Request body too large"));
    }

    #[test]
    fn provider_errors_map_to_opaque_app_error() {
        let err = GenerateError::from(ProviderError::Unauthorized("bad key sk-1".to_string()));
        match AppError::from(err) {
            AppError::Opaque { message, source } => {
                assert_eq!(message, GENERATION_FAILED_MESSAGE);
                assert!(source.to_string().contains("bad key"));
            }
            other => panic!("unexpected mapping: {other:?}"),
        }
    }
}
