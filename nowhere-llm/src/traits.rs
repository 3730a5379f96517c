//! The provider-agnostic interface the research agent calls into.
use async_trait::async_trait;
use nowhere_common::Result;

/// A single call into a chat-completion backend.
///
/// `streaming` is a hint, not a contract: adapters that can't stream (or for
/// which streaming buys nothing over a single `await`) are free to ignore it
/// and return the full text once generation finishes. The agent only ever
/// consumes the final string either way.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn process_text(
        &self,
        system_prompt: Option<&str>,
        user_prompt: &str,
        streaming: bool,
    ) -> Result<String>;

    /// Model identifier, for diary entries and log correlation.
    fn model_name(&self) -> &str;
}

#[derive(thiserror::Error, Debug)]
pub enum LlmError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("provider API error: {0}")]
    Api(String),

    #[error("model not available: {0}")]
    ModelNotAvailable(String),

    #[error("rate limit exceeded")]
    RateLimit,

    #[error("configuration error: {0}")]
    Config(String),
}
