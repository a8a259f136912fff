//! Redis-backed session store.
//!
//! Each session is one redis entry: key `prefix + id` (default prefix
//! `"sess:"`), value the JSON-serialized payload, TTL the configured timeout.
//! Redis enforces expiry server-side, so an expired session simply stops
//! resolving.

use std::collections::HashMap;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde_json::Value;

use super::SessionStore;
use crate::config::StoreConfig;
use crate::error::SessionError;
use crate::session::{generate_session_id, Session};

const DEFAULT_PREFIX: &str = "sess:";

/// Session store backed by a remote redis instance.
///
/// Saves are blind overwrites with expiry (last writer wins); there is no
/// optimistic concurrency. Id regeneration is save-under-new-key then
/// delete-old-key, which is not atomic: a failure between the two steps can
/// leave both keys alive. This is a documented limitation of the backend,
/// which offers no keyed rename that also rewrites the expiry.
pub struct RedisStore {
    conn: ConnectionManager,
    prefix: String,
    config: StoreConfig,
}

impl RedisStore {
    /// Create a store from a redis client, with default configuration.
    pub async fn new(client: redis::Client) -> Result<Self, SessionError> {
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::from_connection_manager(conn))
    }

    /// Create a store from a redis connection string.
    pub async fn from_url(url: &str) -> Result<Self, SessionError> {
        let client = redis::Client::open(url)?;
        Self::new(client).await
    }

    /// Create a store from an existing connection manager.
    pub fn from_connection_manager(conn: ConnectionManager) -> Self {
        Self {
            conn,
            prefix: DEFAULT_PREFIX.to_string(),
            config: StoreConfig::default(),
        }
    }

    /// Set the key prefix (default: `"sess:"`).
    pub fn with_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Replace the store configuration.
    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    fn session_key(&self, id: &str) -> String {
        format!("{}{}", self.prefix, id)
    }

    fn encode(session: &Session) -> Result<Vec<u8>, SessionError> {
        Ok(serde_json::to_vec(session.values())?)
    }
}

impl Clone for RedisStore {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            prefix: self.prefix.clone(),
            config: self.config.clone(),
        }
    }
}

#[async_trait]
impl SessionStore for RedisStore {
    fn config(&self) -> &StoreConfig {
        &self.config
    }

    async fn load(&self, id: &str) -> Result<Session, SessionError> {
        let key = self.session_key(id);
        let mut conn = self.conn.clone();

        // GET answers nil for a missing or expired key; that is the expected
        // NotFound case, not a transport failure.
        let payload: Option<Vec<u8>> = conn.get(&key).await?;
        let payload = payload.ok_or(SessionError::NotFound)?;

        let values: HashMap<String, Value> = serde_json::from_slice(&payload)?;
        Ok(Session::from_parts(id.to_string(), values))
    }

    async fn save(&self, session: &Session) -> Result<(), SessionError> {
        let key = self.session_key(session.id());
        let payload = Self::encode(session)?;
        let mut conn = self.conn.clone();

        if self.config.timeout_secs > 0 {
            conn.set_ex::<_, _, ()>(&key, payload, self.config.timeout_secs)
                .await?;
        } else {
            // Redis rejects SET with a zero expiry; a zero timeout means the
            // session is already expired, so drop the entry instead.
            conn.del::<_, ()>(&key).await?;
        }
        Ok(())
    }

    async fn destroy(&self, session: &Session) -> Result<(), SessionError> {
        let key = self.session_key(session.id());
        let mut conn = self.conn.clone();

        conn.del::<_, ()>(&key).await?;
        Ok(())
    }

    async fn regenerate_id(&self, session: &mut Session) -> Result<String, SessionError> {
        let old_key = self.session_key(session.id());
        let new_id = generate_session_id();
        let new_key = self.session_key(&new_id);
        let payload = Self::encode(session)?;
        let mut conn = self.conn.clone();

        // Write the new key first: if it fails the old id stays authoritative
        // and the session keeps it. Once the new key exists the new id is
        // installed even when the delete below fails, so the caller can read
        // the effective id off the session; the stale old key then dies by
        // expiry. Both keys being briefly live is the documented limitation.
        // A zero timeout writes nothing: the renamed session would expire
        // immediately anyway.
        if self.config.timeout_secs > 0 {
            conn.set_ex::<_, _, ()>(&new_key, payload, self.config.timeout_secs)
                .await?;
        }
        session.set_id(new_id.clone());

        conn.del::<_, ()>(&old_key).await?;
        Ok(new_id)
    }

    async fn refresh_expiry(&self, session: &Session) -> Result<(), SessionError> {
        let key = self.session_key(session.id());
        let mut conn = self.conn.clone();

        // EXPIRE answers false for a missing key; the session will simply
        // resolve NotFound on the next request.
        let _: bool = conn
            .expire(&key, self.config.timeout_secs as i64)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // These tests require a running redis instance:
    //   cargo test --features redis-store -- --ignored

    use super::*;

    async fn test_store() -> RedisStore {
        RedisStore::from_url("redis://127.0.0.1/")
            .await
            .unwrap()
            .with_prefix("sess-test:")
            .with_config(StoreConfig::new(60))
    }

    #[tokio::test]
    #[ignore]
    async fn save_then_load_round_trips_values() {
        let store = test_store().await;

        let mut session = store.create();
        session.set("user", "alice");
        session.set("visits", 3);
        session.set("prefs", serde_json::json!({"theme": "dark", "pager": {"size": 25}}));
        store.save(&session).await.unwrap();

        let loaded = store.load(session.id()).await.unwrap();
        assert_eq!(loaded.get::<String>("user"), Some("alice".to_string()));
        assert_eq!(loaded.get::<i64>("visits"), Some(3));
        let prefs: Value = loaded.get("prefs").unwrap();
        assert_eq!(prefs["pager"]["size"], 25);

        store.destroy(&session).await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    async fn zero_timeout_save_expires_immediately() {
        let store = RedisStore::from_url("redis://127.0.0.1/")
            .await
            .unwrap()
            .with_prefix("sess-test:")
            .with_config(StoreConfig::new(0));

        let mut session = store.create();
        session.set("user", "alice");
        store.save(&session).await.unwrap();

        assert!(store.load(session.id()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    #[ignore]
    async fn destroy_removes_session() {
        let store = test_store().await;

        let session = store.create();
        store.save(&session).await.unwrap();
        store.destroy(&session).await.unwrap();

        assert!(store.load(session.id()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    #[ignore]
    async fn refresh_expiry_keeps_session_alive() {
        let store = test_store().await;

        let mut session = store.create();
        session.set("user", "alice");
        store.save(&session).await.unwrap();

        store.refresh_expiry(&session).await.unwrap();
        assert!(store.load(session.id()).await.is_ok());

        store.destroy(&session).await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    async fn regenerate_id_installs_new_key() {
        let store = test_store().await;

        let mut session = store.create();
        session.set("user", "alice");
        store.save(&session).await.unwrap();
        let old_id = session.id().to_string();

        let new_id = store.regenerate_id(&mut session).await.unwrap();
        assert_ne!(new_id, old_id);

        let loaded = store.load(&new_id).await.unwrap();
        assert_eq!(loaded.get::<String>("user"), Some("alice".to_string()));
        assert!(store.load(&old_id).await.unwrap_err().is_not_found());

        store.destroy(&session).await.unwrap();
    }
}
