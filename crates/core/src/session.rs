//! Sessions and the session store trait.
//!
//! A session is an opaque identifier owning one [`Conversation`]. Stores are
//! explicit objects handed to every agent invocation; there is no
//! process-wide default.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use crate::error::SessionError;
use crate::message::{Conversation, ConversationId, Message};

/// One session: an id and the conversation it owns.
///
/// The conversation sits behind an async mutex so that two agent turns on
/// the same session run one after the other.
#[derive(Debug)]
pub struct Session {
    id: String,
    conversation: Mutex<Conversation>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let conversation = Conversation::with_id(ConversationId::from(&id));
        Self {
            id,
            conversation: Mutex::new(conversation),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Exclusive access to the conversation for the duration of a turn.
    pub async fn lock(&self) -> MutexGuard<'_, Conversation> {
        self.conversation.lock().await
    }

    /// Clone of the current conversation.
    pub async fn snapshot(&self) -> Conversation {
        self.conversation.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.conversation.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.conversation.lock().await.is_empty()
    }
}

/// Storage for sessions.
///
/// Implementations: in-memory (`chainloom-memory`). Durable backends can
/// satisfy the same contract.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store name (e.g., "in_memory").
    fn name(&self) -> &str;

    /// Return the session for `session_id`, creating an empty one on first
    /// reference. Concurrent first calls observe the same session.
    async fn get(&self, session_id: &str) -> Arc<Session>;

    /// Look up an existing session without creating it.
    async fn find(&self, session_id: &str) -> Option<Arc<Session>>;

    /// Append to an existing session's conversation.
    async fn append(&self, session_id: &str, message: Message) -> Result<(), SessionError> {
        let session = self
            .find(session_id)
            .await
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
        session.lock().await.push(message);
        Ok(())
    }

    /// Empty a session's conversation. Returns false if the session is unknown.
    async fn clear(&self, session_id: &str) -> Result<bool, SessionError> {
        match self.find(session_id).await {
            Some(session) => {
                session.lock().await.clear();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Drop a session entirely. Returns false if it did not exist.
    async fn remove(&self, session_id: &str) -> Result<bool, SessionError>;

    /// All known session ids, sorted.
    async fn session_ids(&self) -> Vec<String>;
}
