//! Core chat pipeline
//!
//! This module contains the two remote clients (reply and translation), the
//! per-turn pipeline that chains them, and the in-memory session store.

mod chat;
mod completion;
mod session;
mod translation;

pub use chat::{ChatEngine, TurnOutcome};
#[cfg(test)]
pub use completion::CompletionClient;
pub use session::{lock_now, SessionError, SessionStore};
#[cfg(test)]
pub use translation::TranslationClient;
