//! Scripted backend for exercising the pipeline without a network

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::conversation::Message;

use super::{ChatBackend, ProviderError, Reply};

/// Backend that replays scripted results and records every request.
pub struct ScriptedBackend {
    model: String,
    replies: Mutex<VecDeque<Result<Reply, ProviderError>>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedBackend {
    pub fn new(replies: Vec<Result<String, ProviderError>>) -> Arc<Self> {
        Self::from_replies(
            replies
                .into_iter()
                .map(|r| r.map(Reply::new))
                .collect(),
        )
    }

    /// Script full replies, e.g. ones that report skipped stream chunks.
    pub fn from_replies(replies: Vec<Result<Reply, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            model: "scripted".to_string(),
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Vec<Message> {
        self.requests.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[Message]) -> Result<Reply, ProviderError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(ProviderError::EmptyResult))
    }
}

