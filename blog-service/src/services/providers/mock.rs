//! Mock provider implementation for tests and credential-free local runs.

use super::{FinishReason, GenerationParams, ProviderError, ProviderResponse, TextProvider};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone)]
enum MockBehavior {
    Echo,
    Reply(String),
    Fail(String),
}

/// Mock text provider that records every call it receives.
pub struct MockTextProvider {
    behavior: MockBehavior,
    calls: AtomicUsize,
    last_call: Mutex<Option<(String, GenerationParams)>>,
}

impl MockTextProvider {
    fn with_behavior(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            last_call: Mutex::new(None),
        }
    }

    /// Answers with `Mock response for: <prompt>`.
    pub fn echo() -> Self {
        Self::with_behavior(MockBehavior::Echo)
    }

    /// Answers every call with `text` verbatim.
    pub fn replying(text: impl Into<String>) -> Self {
        Self::with_behavior(MockBehavior::Reply(text.into()))
    }

    /// Fails every call with an API error carrying `detail`.
    pub fn failing(detail: impl Into<String>) -> Self {
        Self::with_behavior(MockBehavior::Fail(detail.into()))
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_call().map(|(prompt, _)| prompt)
    }

    pub fn last_params(&self) -> Option<GenerationParams> {
        self.last_call().map(|(_, params)| params)
    }

    fn last_call(&self) -> Option<(String, GenerationParams)> {
        self.last_call
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl TextProvider for MockTextProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .last_call
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) =
            Some((prompt.to_string(), params.clone()));

        let text = match &self.behavior {
            MockBehavior::Echo => format!("Mock response for: {}", prompt),
            MockBehavior::Reply(text) => text.clone(),
            MockBehavior::Fail(detail) => return Err(ProviderError::ApiError(detail.clone())),
        };

        Ok(ProviderResponse {
            output_tokens: Some(text.split_whitespace().count() as u32),
            text,
            finish_reason: FinishReason::Complete,
            input_tokens: Some(prompt.len() as u32 / 4),
        })
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}
