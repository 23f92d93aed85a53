//! AI provider integrations

pub mod openai_compat;
#[cfg(test)]
pub(crate) mod scripted;
pub mod stream;

use async_trait::async_trait;
use thiserror::Error;

use crate::conversation::Message;

pub use openai_compat::{OpenAICompatConfig, OpenAICompatProvider};

#[derive(Debug, Error)]
pub enum ProviderError {
    /// Connection failure, timeout or non-success HTTP status
    #[error("Request failed: {0}")]
    Transport(String),

    /// The response body could not be decoded
    #[error("Invalid response: {0}")]
    Decode(String),

    /// The call succeeded but produced no text
    #[error("No content in response")]
    EmptyResult,

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        ProviderError::Transport(e.to_string())
    }
}

/// An assembled reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Trimmed, non-empty text
    pub text: String,
    /// Malformed stream chunks dropped while assembling `text`
    pub skipped: usize,
}

impl Reply {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            skipped: 0,
        }
    }
}

/// A remote chat-completion service that turns an ordered list of turns
/// into one assembled reply.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Model identifier sent with every request
    fn model(&self) -> &str;

    /// Send the turns and return the assembled reply.
    async fn complete(&self, messages: &[Message]) -> Result<Reply, ProviderError>;
}
