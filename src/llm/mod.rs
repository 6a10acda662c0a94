//! Hosted chat model backends.
//!
//! A backend takes the running transcript, the tool menu and an optional
//! system instruction, and returns one model turn. Backends never retry;
//! every failure is returned to the caller.

mod anthropic;
mod openai;
mod types;

pub use anthropic::AnthropicBackend;
pub use openai::OpenAIBackend;
pub use types::{
    ContentBlock, ModelResponse, Role, StopReason, TokenUsage, ToolInvocation,
    ToolInvocationResult, ToolSpec, Transcript, Turn, TurnContent,
};

use crate::config::{ChatBackendKind, ChatSettings};
use crate::env::Environment;
use crate::error::{GymmandoError, Result};
use async_trait::async_trait;

/// Everything a backend needs for one model turn.
#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    pub transcript: &'a Transcript,
    pub tools: &'a [ToolSpec],
    pub system: Option<&'a str>,
}

/// Trait for hosted chat models.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Request one model turn.
    async fn respond(&self, request: ChatRequest<'_>) -> Result<ModelResponse>;

    /// The model this backend talks to.
    fn model(&self) -> &str;
}

/// Build the configured backend.
///
/// Fails with a missing-credential error when the backend's API key is not
/// present, so callers can validate before launching anything.
pub fn create_backend(settings: &ChatSettings, env: &dyn Environment) -> Result<Box<dyn ChatBackend>> {
    let var = settings.backend.credential_var();
    let key = env
        .var(var)
        .ok_or_else(|| GymmandoError::missing_credential(var))?;

    match settings.backend {
        ChatBackendKind::Anthropic => Ok(Box::new(AnthropicBackend::new(key, settings)?)),
        ChatBackendKind::OpenAI => Ok(Box::new(OpenAIBackend::new(key, settings)?)),
    }
}
