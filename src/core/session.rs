//! In-memory session storage
//!
//! Each browser session owns one [`Conversation`]. Nothing outlives the
//! process, and sessions left idle longer than the configured TTL are
//! dropped. The store also holds at most `max_sessions` conversations; when
//! it is full the least recently used idle session makes room.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, MutexGuard, RwLock};
use uuid::Uuid;

use crate::conversation::Conversation;

pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(3600);
pub const DEFAULT_MAX_SESSIONS: usize = 1000;

/// A session's conversation. Holding the lock serializes user actions
/// within that session.
pub type SharedConversation = Arc<Mutex<Conversation>>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Unknown session: {0}")]
    NotFound(Uuid),

    #[error("Session {0} is busy with another message")]
    Busy(Uuid),
}

struct SessionEntry {
    conversation: SharedConversation,
    last_used: Instant,
}

impl SessionEntry {
    fn new(conversation: Conversation, now: Instant) -> Self {
        Self {
            conversation: Arc::new(Mutex::new(conversation)),
            last_used: now,
        }
    }

    /// A handler still holds the conversation
    fn in_use(&self) -> bool {
        Arc::strong_count(&self.conversation) > 1
    }
}

/// Session store keyed by session id
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, SessionEntry>>,
    idle_ttl: Duration,
    max_sessions: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_limits(DEFAULT_IDLE_TTL, DEFAULT_MAX_SESSIONS)
    }
}

impl SessionStore {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(idle_ttl: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    /// Start a new, empty session
    pub async fn create(&self) -> (Uuid, SharedConversation) {
        let conversation = Conversation::new();
        let id = conversation.id;
        let now = Instant::now();

        let mut sessions = self.sessions.write().await;
        self.make_room(&mut sessions, now);
        let entry = SessionEntry::new(conversation, now);
        let shared = entry.conversation.clone();
        sessions.insert(id, entry);

        tracing::debug!("Created session {}", id);
        (id, shared)
    }

    /// Look up a session and mark it as used
    pub async fn get(&self, id: &Uuid) -> Option<SharedConversation> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(id)?;
        entry.last_used = Instant::now();
        Some(entry.conversation.clone())
    }

    /// Look up a session, starting it empty if it does not exist yet
    pub async fn get_or_create(&self, id: Uuid) -> SharedConversation {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;

        if let Some(entry) = sessions.get_mut(&id) {
            entry.last_used = now;
            return entry.conversation.clone();
        }

        self.make_room(&mut sessions, now);
        let entry = SessionEntry::new(Conversation::with_id(id), now);
        let shared = entry.conversation.clone();
        sessions.insert(id, entry);

        tracing::debug!("Created session {}", id);
        shared
    }

    /// Wipe a session's history.
    pub async fn clear(&self, id: &Uuid) -> Result<(), SessionError> {
        let conversation = self.get(id).await.ok_or(SessionError::NotFound(*id))?;
        let mut guard = lock_now(id, &conversation)?;
        if guard.is_empty() {
            return Ok(());
        }
        guard.clear();
        tracing::info!("Cleared history for session {}", id);
        Ok(())
    }

    /// Drop every session idle for longer than the TTL. Returns how many
    /// were removed.
    pub async fn evict_idle(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        self.evict_idle_at(&mut sessions, Instant::now())
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    fn evict_idle_at(&self, sessions: &mut HashMap<Uuid, SessionEntry>, now: Instant) -> usize {
        let before = sessions.len();
        sessions.retain(|id, entry| {
            let expired =
                !entry.in_use() && now.saturating_duration_since(entry.last_used) > self.idle_ttl;
            if expired {
                tracing::debug!("Evicting idle session {}", id);
            }
            !expired
        });
        before - sessions.len()
    }

    /// Expire idle sessions, then drop least recently used ones until a new
    /// session fits under the cap.
    fn make_room(&self, sessions: &mut HashMap<Uuid, SessionEntry>, now: Instant) {
        self.evict_idle_at(sessions, now);

        while sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .filter(|(_, entry)| !entry.in_use())
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(id, _)| *id);

            match oldest {
                Some(id) => {
                    tracing::debug!("Session limit reached, evicting {}", id);
                    sessions.remove(&id);
                }
                None => {
                    tracing::warn!(
                        "All {} sessions are busy, exceeding the session limit",
                        sessions.len()
                    );
                    break;
                }
            }
        }
    }
}

/// Take a conversation's lock only if no turn is running on it.
pub fn lock_now<'a>(
    id: &Uuid,
    conversation: &'a SharedConversation,
) -> Result<MutexGuard<'a, Conversation>, SessionError> {
    conversation.try_lock().map_err(|_| SessionError::Busy(*id))
}
