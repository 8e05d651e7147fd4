//! Text generation provider abstractions and implementations.
//!
//! The handler only sees `TextProvider`; the concrete backend is chosen from
//! configuration at startup.

pub mod mock;
pub mod openai;

use crate::config::{ProviderConfig, ProviderKind};
use async_trait::async_trait;
use service_core::error::AppError;
use std::sync::Arc;
use thiserror::Error;

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Authentication rejected: {0}")]
    Unauthorized(String),

    #[error("Rate limited by provider")]
    RateLimited,

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Result of a provider call.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    /// Text of the first completion, untrimmed.
    pub text: String,

    pub finish_reason: FinishReason,

    pub input_tokens: Option<u32>,

    pub output_tokens: Option<u32>,
}

/// Reason why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Complete,
    Length,
    ContentFilter,
    Unknown,
}

impl FinishReason {
    pub fn from_api(reason: Option<&str>) -> Self {
        match reason {
            Some("stop") => FinishReason::Complete,
            Some("length") => FinishReason::Length,
            Some("content_filter") => FinishReason::ContentFilter,
            _ => FinishReason::Unknown,
        }
    }
}

/// Generation parameters for a single call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationParams {
    /// Maximum output tokens.
    pub max_tokens: Option<u32>,
}

/// Trait for text generation providers.
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Generate a completion for `prompt`.
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError>;

    /// Whether the provider can serve requests. Does not call the remote API.
    async fn health_check(&self) -> Result<(), ProviderError>;
}

/// Build the provider selected by configuration.
pub fn from_config(config: &ProviderConfig) -> Result<Arc<dyn TextProvider>, AppError> {
    let provider: Arc<dyn TextProvider> = match config.kind {
        ProviderKind::OpenAi => {
            let provider = openai::OpenAiCompletionProvider::new(config.into())
                .map_err(|e| AppError::ConfigError(anyhow::Error::new(e)))?;
            Arc::new(provider)
        }
        ProviderKind::Mock => Arc::new(mock::MockTextProvider::echo()),
    };
    Ok(provider)
}
