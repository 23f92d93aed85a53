//! Per-turn chat pipeline
//!
//! The ChatEngine drives one user action through both remote services:
//! 1. Records the user turn
//! 2. Requests the twin's reply with the prior history
//! 3. Records the reply and, only then, requests its Korean translation
//! 4. Records the translation directly under its source reply
//!
//! Failures never escape a turn. Each degraded step is reported as a
//! [`Notice`] and the conversation stays usable for the next message.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{Config, EndpointConfig, Persona};
use crate::conversation::{prepare_history, Conversation};
use crate::providers::{OpenAICompatConfig, OpenAICompatProvider, ProviderError, Reply};

use super::completion::CompletionClient;
use super::translation::TranslationClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A user-visible note about a step that produced no output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// What a single user action produced
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub reply: Option<String>,
    pub translation: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notices: Vec<Notice>,
}

/// The core chat engine
#[derive(Clone)]
pub struct ChatEngine {
    completion: CompletionClient,
    translation: TranslationClient,
}

impl ChatEngine {
    pub fn new(completion: CompletionClient, translation: TranslationClient) -> Self {
        Self {
            completion,
            translation,
        }
    }

    /// Wire both clients to the OpenAI-compatible endpoints in `config`
    pub fn from_config(config: &Config, persona: &Persona) -> Result<Self, ProviderError> {
        let completion = provider_for(config, &config.completion, false)?;

        let translation = match &config.translation {
            Some(endpoint) => TranslationClient::new(
                Arc::new(provider_for(config, endpoint, true)?),
                persona.translation.clone(),
            ),
            None => TranslationClient::unconfigured(persona.translation.clone()),
        };

        Ok(Self::new(CompletionClient::new(Arc::new(completion)), translation))
    }

    pub fn translation_enabled(&self) -> bool {
        self.translation.is_configured()
    }

    /// Run one user message through reply and translation, appending every
    /// produced turn to `conversation` in order.
    pub async fn run_turn(&self, conversation: &mut Conversation, message: &str) -> TurnOutcome {
        let mut outcome = TurnOutcome::default();

        let message = message.trim();
        if message.is_empty() {
            outcome
                .notices
                .push(Notice::new(NoticeLevel::Warning, "Message is empty."));
            return outcome;
        }

        // history is taken before the new turn so the message is sent once
        let history = prepare_history(&conversation.messages);
        conversation.add_user(message);

        let reply = match self.completion.get_reply(message, &history).await {
            Ok(reply) => reply,
            Err(e) => {
                outcome.notices.push(completion_notice(&e));
                return outcome;
            }
        };

        if let Some(notice) = skipped_notice("reply", &reply) {
            outcome.notices.push(notice);
        }
        conversation.add_assistant(&reply.text);
        outcome.reply = Some(reply.text.clone());

        match self.translation.translate(&reply.text).await {
            Ok(translated) => {
                if let Err(e) = conversation.add_translation(&translated.text) {
                    tracing::error!("Dropping translation for {}: {}", conversation.id, e);
                    outcome
                        .notices
                        .push(Notice::new(NoticeLevel::Error, e.to_string()));
                } else {
                    if let Some(notice) = skipped_notice("translation", &translated) {
                        outcome.notices.push(notice);
                    }
                    outcome.translation = Some(translated.text);
                }
            }
            Err(e) => outcome.notices.push(translation_notice(&e)),
        }

        outcome
    }
}

fn provider_for(
    config: &Config,
    endpoint: &EndpointConfig,
    stream_query_param: bool,
) -> Result<OpenAICompatProvider, ProviderError> {
    let provider_config = OpenAICompatConfig::new(&endpoint.base_url, &endpoint.model)
        .with_api_key(endpoint.api_key.clone())
        .with_sampling(config.temperature, config.max_tokens)
        .with_stream_query_param(stream_query_param)
        .with_timeout(config.request_timeout_secs);

    OpenAICompatProvider::new(provider_config)
}

/// A reply assembled around unreadable stream chunks may be missing text.
fn skipped_notice(step: &str, reply: &Reply) -> Option<Notice> {
    if reply.skipped == 0 {
        return None;
    }
    tracing::warn!("{} skipped {} malformed chunk(s)", step, reply.skipped);
    Some(Notice::new(
        NoticeLevel::Warning,
        format!(
            "The {} may be incomplete: {} malformed chunk(s) were skipped.",
            step, reply.skipped
        ),
    ))
}

fn completion_notice(err: &ProviderError) -> Notice {
    match err {
        ProviderError::EmptyResult => {
            tracing::warn!("Completion produced no content");
            Notice::new(NoticeLevel::Warning, "No reply was generated.")
        }
        other => {
            tracing::error!("Completion failed: {}", other);
            Notice::new(NoticeLevel::Error, format!("Reply failed: {}", other))
        }
    }
}

fn translation_notice(err: &ProviderError) -> Notice {
    match err {
        ProviderError::ServiceUnavailable(reason) => {
            tracing::debug!("Skipping translation: {}", reason);
            Notice::new(
                NoticeLevel::Info,
                format!("Translation service unavailable: {}", reason),
            )
        }
        ProviderError::EmptyResult => {
            tracing::warn!("Translation produced no content");
            Notice::new(NoticeLevel::Warning, "Translation came back empty.")
        }
        ProviderError::Decode(detail) => {
            tracing::error!("Translation response malformed: {}", detail);
            Notice::new(
                NoticeLevel::Error,
                "Empty or invalid JSON response from translation API",
            )
        }
        ProviderError::Transport(detail) => {
            tracing::error!("Translation request failed: {}", detail);
            Notice::new(NoticeLevel::Error, format!("Translation failed: {}", detail))
        }
    }
}
