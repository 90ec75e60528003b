//! In-memory session store.

use async_trait::async_trait;
use reflexion_core::error::SessionError;
use reflexion_core::session::{ChatEntry, Session, SessionStore, SessionSummary};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// A session store that keeps every transcript in a HashMap.
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
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

    async fn get(&self, id: &str) -> Result<Option<Session>, SessionError> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn get_or_create(&self, id: &str) -> Result<Session, SessionError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(id.to_string()).or_insert_with(|| {
            debug!(session_id = id, "Creating session");
            Session::new(id)
        });
        Ok(session.clone())
    }

    async fn append(&self, id: &str, entry: ChatEntry) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(id.to_string())
            .or_insert_with(|| Session::new(id))
            .messages
            .push(entry);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SessionSummary>, SessionError> {
        let sessions = self.sessions.read().await;
        let mut summaries: Vec<SessionSummary> = sessions
            .values()
            .map(|s| SessionSummary {
                id: s.id.clone(),
                message_count: s.messages.len(),
                created_at: s.created_at,
            })
            .collect();
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reflexion_core::session::Sender;

    #[tokio::test]
    async fn append_creates_session() {
        let store = InMemorySessionStore::new();
        assert!(store.get("s1").await.unwrap().is_none());

        store.append("s1", ChatEntry::user("hello")).await.unwrap();
        store.append("s1", ChatEntry::ai("hi there", 1)).await.unwrap();

        let session = store.get("s1").await.unwrap().unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[0].sender, Sender::User);
        assert_eq!(session.messages[1].iterations, Some(1));
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let store = InMemorySessionStore::new();
        let first = store.get_or_create("default").await.unwrap();
        store.append("default", ChatEntry::user("x")).await.unwrap();
        let second = store.get_or_create("default").await.unwrap();
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(second.messages.len(), 1);
    }

    #[tokio::test]
    async fn list_reports_counts() {
        let store = InMemorySessionStore::new();
        store.append("a", ChatEntry::user("1")).await.unwrap();
        store.append("b", ChatEntry::user("1")).await.unwrap();
        store.append("b", ChatEntry::ai("2", 0)).await.unwrap();

        let list = store.list().await.unwrap();
        assert_eq!(list.len(), 2);
        let b = list.iter().find(|s| s.id == "b").unwrap();
        assert_eq!(b.message_count, 2);
    }

    #[tokio::test]
    async fn concurrent_appends_are_all_kept() {
        let store = Arc::new(InMemorySessionStore::new());
        let handles: Vec<_> = (0..20)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store.append("shared", ChatEntry::user(format!("m{i}"))).await.unwrap();
                })
            })
            .collect();
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(store.get("shared").await.unwrap().unwrap().messages.len(), 20);
    }
}
