//! Streaming chat-completion decoding
//!
//! OpenAI-compatible servers answer a `stream: true` request with
//! server-sent events whose data is a JSON chunk carrying a
//! `choices[0].delta.content` fragment, and end the stream with a
//! `[DONE]` event. Event framing is left to `eventsource-stream`; this
//! module maps each event to a [`Frame`] and folds the frames into a reply.

use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;

use super::{ProviderError, Reply};

const DONE_SENTINEL: &str = "[DONE]";

/// One incremental fragment of a streamed completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamChunk {
    pub content: Option<String>,
}

/// A decoded server-sent event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Chunk(StreamChunk),
    Done,
    /// Events without data
    Ignored,
    Malformed(String),
}

#[derive(Debug, Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<Delta>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

/// Decode the data of a single event.
pub fn parse_data(data: &str) -> Frame {
    let data = data.trim();

    if data == DONE_SENTINEL {
        return Frame::Done;
    }
    if data.is_empty() {
        return Frame::Ignored;
    }

    let payload: ChunkPayload = match serde_json::from_str(data) {
        Ok(payload) => payload,
        Err(e) => return Frame::Malformed(format!("{}: {}", e, data)),
    };

    if let Some(error) = payload.error {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Frame::Malformed(format!("API error in stream: {}", message));
    }

    let content = payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content);

    Frame::Chunk(StreamChunk { content })
}

/// Lazily decode a byte stream of server-sent events into frames.
///
/// A transport or framing error ends the sequence after yielding it.
pub fn sse_frames<S, B, E>(bytes: S) -> impl Stream<Item = Result<Frame, ProviderError>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    async_stream::stream! {
        let events = bytes.eventsource();
        futures::pin_mut!(events);

        while let Some(event) = events.next().await {
            match event {
                Ok(event) => {
                    tracing::trace!("SSE event: {:?}", event.data);
                    yield Ok(parse_data(&event.data));
                }
                Err(e) => {
                    yield Err(ProviderError::Transport(format!("stream interrupted: {}", e)));
                    return;
                }
            }
        }
    }
}

/// Fold state for a streamed reply
#[derive(Debug, Default)]
pub struct Accumulator {
    text: String,
    fragments: usize,
    skipped: usize,
    done: bool,
}

impl Accumulator {
    /// Apply one frame. Returns `false` once the terminal sentinel was seen.
    pub fn push(&mut self, frame: Frame) -> bool {
        if self.done {
            return false;
        }
        match frame {
            Frame::Chunk(StreamChunk {
                content: Some(content),
            }) if !content.is_empty() => {
                self.text.push_str(&content);
                self.fragments += 1;
            }
            Frame::Chunk(_) | Frame::Ignored => {}
            Frame::Malformed(reason) => {
                self.skipped += 1;
                tracing::warn!("Skipping malformed stream chunk: {}", reason);
            }
            Frame::Done => self.done = true,
        }
        !self.done
    }

    pub fn fragments(&self) -> usize {
        self.fragments
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Trimmed reply, or [`ProviderError::EmptyResult`] when nothing was produced.
    pub fn finish(self) -> Result<Reply, ProviderError> {
        let text = self.text.trim();
        if text.is_empty() {
            Err(ProviderError::EmptyResult)
        } else {
            Ok(Reply {
                text: text.to_string(),
                skipped: self.skipped,
            })
        }
    }
}

/// Consume frames until `[DONE]` or the end of the stream.
pub async fn collect_reply<S>(frames: S) -> Result<Reply, ProviderError>
where
    S: Stream<Item = Result<Frame, ProviderError>>,
{
    futures::pin_mut!(frames);
    let mut acc = Accumulator::default();

    while let Some(frame) = frames.next().await {
        if !acc.push(frame?) {
            break;
        }
    }

    tracing::debug!(
        fragments = acc.fragments(),
        skipped = acc.skipped(),
        "Stream aggregation finished"
    );
    acc.finish()
}
