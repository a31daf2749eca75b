//! In-memory session store. Sessions live as long as the store.

use async_trait::async_trait;
use chainloom_core::error::SessionError;
use chainloom_core::session::{Session, SessionStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// A session store backed by a `HashMap`.
///
/// Get-or-create takes the write lock and goes through the entry API, so two
/// concurrent first references to one id share a single session.
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, Arc<Session>>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of sessions currently held.
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn get(&self, session_id: &str) -> Arc<Session> {
        if let Some(session) = self.sessions.read().await.get(session_id) {
            return Arc::clone(session);
        }

        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(session_id.to_string()).or_insert_with(|| {
            debug!(session_id, "Creating session");
            Arc::new(Session::new(session_id))
        });
        Arc::clone(session)
    }

    async fn find(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    async fn remove(&self, session_id: &str) -> Result<bool, SessionError> {
        let removed = self.sessions.write().await.remove(session_id).is_some();
        if removed {
            debug!(session_id, "Removed session");
        }
        Ok(removed)
    }

    async fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}
