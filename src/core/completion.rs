//! Reply generation against the completion endpoint

use std::sync::Arc;

use crate::conversation::{prepare_history, Message};
use crate::providers::{ChatBackend, ProviderError, Reply};

/// Sends the conversation so far plus the new user message and returns the
/// assembled assistant reply.
#[derive(Clone)]
pub struct CompletionClient {
    backend: Arc<dyn ChatBackend>,
}

impl CompletionClient {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    pub fn model(&self) -> &str {
        self.backend.model()
    }

    /// `Err(ProviderError::EmptyResult)` means the call worked but nothing
    /// was generated.
    pub async fn get_reply(
        &self,
        user_message: &str,
        prior_turns: &[Message],
    ) -> Result<Reply, ProviderError> {
        // prior turns are re-filtered so system or blank turns never leak through
        let mut messages = prepare_history(prior_turns);
        messages.push(Message::user(user_message));

        tracing::debug!(
            "Requesting reply from {} with {} turn(s)",
            self.model(),
            messages.len()
        );
        self.backend.complete(&messages).await
    }
}
