//! In-memory session store.
//!
//! Intended for development and testing: sessions are lost on restart, are
//! not shared across server instances, and no expiry is enforced.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use super::SessionStore;
use crate::config::StoreConfig;
use crate::error::SessionError;
use crate::session::{generate_session_id, Session};

type SessionMap = HashMap<String, HashMap<String, Value>>;

/// In-process session store backed by a map from id to payload.
///
/// `Clone` shares the underlying map, so cloned handles see the same
/// sessions. The map is guarded by a single lock; operations that touch two
/// keys (id regeneration) hold it across both touches and are therefore
/// atomic with respect to other `MemoryStore` operations.
pub struct MemoryStore {
    sessions: Arc<RwLock<SessionMap>>,
    config: StoreConfig,
}

impl MemoryStore {
    /// Create a memory store with default configuration.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create a memory store with the given configuration.
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// Number of live sessions in the store.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// True when the store holds no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MemoryStore {
    fn clone(&self) -> Self {
        Self {
            sessions: Arc::clone(&self.sessions),
            config: self.config.clone(),
        }
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    fn config(&self) -> &StoreConfig {
        &self.config
    }

    async fn load(&self, id: &str) -> Result<Session, SessionError> {
        let sessions = self.sessions.read();
        match sessions.get(id) {
            Some(values) => Ok(Session::from_parts(id.to_string(), values.clone())),
            None => Err(SessionError::NotFound),
        }
    }

    async fn save(&self, session: &Session) -> Result<(), SessionError> {
        self.sessions
            .write()
            .insert(session.id().to_string(), session.values().clone());
        Ok(())
    }

    async fn destroy(&self, session: &Session) -> Result<(), SessionError> {
        self.sessions.write().remove(session.id());
        Ok(())
    }

    async fn regenerate_id(&self, session: &mut Session) -> Result<String, SessionError> {
        let new_id = generate_session_id();
        {
            // One write-lock acquisition covers remove and insert, so no other
            // operation can observe the session under neither id or both ids.
            let mut sessions = self.sessions.write();
            if let Some(values) = sessions.remove(session.id()) {
                sessions.insert(new_id.clone(), values);
            }
        }
        session.set_id(new_id.clone());
        Ok(new_id)
    }

    async fn refresh_expiry(&self, _session: &Session) -> Result<(), SessionError> {
        // No expiry is enforced, nothing to refresh.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_load_round_trips_values() {
        let store = MemoryStore::new();

        let mut session = store.create();
        session.set("user", "alice");
        session.set("visits", 3);
        session.set("prefs", serde_json::json!({"theme": "dark"}));
        store.save(&session).await.unwrap();

        let loaded = store.load(session.id()).await.unwrap();
        assert!(!loaded.is_dirty());
        assert_eq!(loaded.get::<String>("user"), Some("alice".to_string()));
        assert_eq!(loaded.get::<i64>("visits"), Some(3));
        let prefs: Value = loaded.get("prefs").unwrap();
        assert_eq!(prefs["theme"], "dark");
    }

    #[tokio::test]
    async fn load_of_unknown_id_is_not_found() {
        let store = MemoryStore::new();
        let err = store.load("no-such-session").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn destroy_removes_session() {
        let store = MemoryStore::new();

        let session = store.create();
        store.save(&session).await.unwrap();
        store.destroy(&session).await.unwrap();

        let err = store.load(session.id()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn regenerate_id_moves_session_atomically() {
        let store = MemoryStore::new();

        let mut session = store.create();
        session.set("user", "alice");
        store.save(&session).await.unwrap();
        let old_id = session.id().to_string();

        let new_id = store.regenerate_id(&mut session).await.unwrap();
        assert_ne!(new_id, old_id);
        assert_eq!(session.id(), new_id);

        let loaded = store.load(&new_id).await.unwrap();
        assert_eq!(loaded.get::<String>("user"), Some("alice".to_string()));
        assert!(store.load(&old_id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn regenerate_id_of_unsaved_session_only_renames() {
        let store = MemoryStore::new();

        let mut session = store.create();
        let new_id = store.regenerate_id(&mut session).await.unwrap();

        assert_eq!(session.id(), new_id);
        assert!(store.load(&new_id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn concurrent_saves_do_not_cross_contaminate() {
        let store = MemoryStore::new();

        let mut a = store.create();
        a.set("who", "alice");
        let mut b = store.create();
        b.set("who", "bob");

        let (ra, rb) = tokio::join!(store.save(&a), store.save(&b));
        ra.unwrap();
        rb.unwrap();

        let loaded_a = store.load(a.id()).await.unwrap();
        let loaded_b = store.load(b.id()).await.unwrap();
        assert_eq!(loaded_a.get::<String>("who"), Some("alice".to_string()));
        assert_eq!(loaded_b.get::<String>("who"), Some("bob".to_string()));
    }

    #[tokio::test]
    async fn clones_share_the_map() {
        let store = MemoryStore::new();
        let other = store.clone();

        let session = store.create();
        store.save(&session).await.unwrap();
        assert!(other.load(session.id()).await.is_ok());
    }
}
