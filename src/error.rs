//! Session error types.

use thiserror::Error;

/// Errors surfaced by session stores.
///
/// [`SessionError::NotFound`] is the expected "no session for this token"
/// outcome and is never logged as an error by the middleware. Everything else
/// is a backend failure: the middleware answers 503 when it happens before the
/// handler runs, and logs-and-proceeds when it happens after.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No session found matching that id.
    #[error("no session found matching that id")]
    NotFound,

    /// Transport or protocol failure talking to the backing store.
    #[error("session store backend error: {0}")]
    Backend(String),

    /// The session payload could not be serialized or deserialized.
    #[error("session payload encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Redis failure (with the `redis-store` feature).
    #[cfg(feature = "redis-store")]
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Database failure (with the `postgres-store` feature).
    #[cfg(feature = "postgres-store")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl SessionError {
    /// True for the expected no-session-for-this-token case, as opposed to a
    /// transport failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SessionError::NotFound)
    }
}
