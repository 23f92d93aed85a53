//! Korean translation of assistant replies

use std::sync::Arc;

use crate::config::TranslationPrompt;
use crate::conversation::Message;
use crate::providers::{ChatBackend, ProviderError, Reply};

/// Wraps a reply in the fixed translation instruction and sends it to the
/// translation endpoint. Without a backend every call reports
/// [`ProviderError::ServiceUnavailable`] and nothing goes over the network.
#[derive(Clone)]
pub struct TranslationClient {
    backend: Option<Arc<dyn ChatBackend>>,
    prompt: TranslationPrompt,
}

impl TranslationClient {
    pub fn new(backend: Arc<dyn ChatBackend>, prompt: TranslationPrompt) -> Self {
        Self {
            backend: Some(backend),
            prompt,
        }
    }

    pub fn unconfigured(prompt: TranslationPrompt) -> Self {
        Self {
            backend: None,
            prompt,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    /// The instruction turn followed by the request carrying `text`.
    pub fn build_messages(&self, text: &str) -> Vec<Message> {
        vec![
            Message::system(self.prompt.instruction.clone()),
            Message::user(self.prompt.render_request(text)),
        ]
    }

    pub async fn translate(&self, text: &str) -> Result<Reply, ProviderError> {
        let Some(backend) = &self.backend else {
            return Err(ProviderError::ServiceUnavailable(
                "translation endpoint is not configured".to_string(),
            ));
        };

        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResult);
        }

        tracing::debug!("Requesting translation from {}", backend.model());
        backend.complete(&self.build_messages(text)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;
    use crate::providers::scripted::ScriptedBackend;

    #[test]
    fn test_exactly_two_turns() {
        let backend = ScriptedBackend::new(vec![]);
        let client = TranslationClient::new(backend, TranslationPrompt::default());

        let messages = client.build_messages("Think different.");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("오직 한국어로만"));
        assert_eq!(messages[1].role, Role::User);
        assert!(messages[1].content.ends_with(": Think different."));
    }

    #[tokio::test]
    async fn test_translate_sends_wrapped_text() {
        let backend = ScriptedBackend::new(vec![Ok("다르게 생각하라.".to_string())]);
        let client = TranslationClient::new(backend.clone(), TranslationPrompt::default());

        assert_eq!(client.translate("Think different.").await.unwrap().text, "다르게 생각하라.");
        assert_eq!(backend.calls(), 1);
        assert_eq!(backend.last_request(), client.build_messages("Think different."));
    }

    #[tokio::test]
    async fn test_unconfigured_never_calls_out() {
        let client = TranslationClient::unconfigured(TranslationPrompt::default());
        assert!(!client.is_configured());
        assert!(matches!(
            client.translate("Hello").await,
            Err(ProviderError::ServiceUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_blank_text_is_not_sent() {
        let backend = ScriptedBackend::new(vec![Ok("unused".to_string())]);
        let client = TranslationClient::new(backend.clone(), TranslationPrompt::default());

        assert!(matches!(client.translate("  ").await, Err(ProviderError::EmptyResult)));
        assert_eq!(backend.calls(), 0);
    }
}
