//! The session store capability interface.

use async_trait::async_trait;
use salvo_core::http::cookie::time::Duration;
use salvo_core::http::cookie::Cookie;
use salvo_core::{Request, Response};

use crate::config::StoreConfig;
use crate::error::SessionError;
use crate::session::Session;

/// A backing store for sessions.
///
/// Implementations persist the session payload under its id and enforce the
/// configured expiry window. The trait is object safe: the middleware exposes
/// an `Arc<dyn SessionStore>` to handlers through the depot so application
/// code can create, destroy or regenerate sessions.
///
/// The cookie-facing operations ([`resolve`](SessionStore::resolve),
/// [`create`](SessionStore::create),
/// [`attach_to_response`](SessionStore::attach_to_response)) are provided
/// methods built on the shared [`StoreConfig`], so backends only implement the
/// keyed persistence primitives.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// The store's shared configuration: timeout and cookie flags.
    fn config(&self) -> &StoreConfig;

    /// Fetch the session stored under `id`.
    ///
    /// Fails with [`SessionError::NotFound`] when the backing store holds no
    /// live data for that id, including when an entry has expired. Transport
    /// failures surface as backend errors and must not be conflated with a
    /// missing entry.
    async fn load(&self, id: &str) -> Result<Session, SessionError>;

    /// Upsert the session's full content and reset its expiry window to the
    /// configured timeout.
    ///
    /// Safe to call for both brand-new and previously saved sessions; the
    /// caller cannot always know which case applies.
    async fn save(&self, session: &Session) -> Result<(), SessionError>;

    /// Remove the session from the backing store. Subsequent
    /// [`load`](SessionStore::load) calls for its id return
    /// [`SessionError::NotFound`].
    async fn destroy(&self, session: &Session) -> Result<(), SessionError>;

    /// Replace the stored key the session lives under, leaving its content
    /// untouched. Issued after a trust-boundary crossing (login) to defend
    /// against session fixation.
    ///
    /// Returns the new id. On error `session.id()` reports the effective id:
    /// backends guaranteeing an atomic rename leave the original id in place,
    /// so no partial rename is observable to the caller.
    async fn regenerate_id(&self, session: &mut Session) -> Result<String, SessionError>;

    /// Slide the backing store's expiry window forward without rewriting the
    /// session's content. Invoked for sessions that were read but not
    /// mutated, to avoid needless writes.
    async fn refresh_expiry(&self, session: &Session) -> Result<(), SessionError>;

    /// Allocate a new session with a freshly generated id and `dirty = true`.
    /// Nothing is written to the backing store until
    /// [`save`](SessionStore::save).
    fn create(&self) -> Session {
        Session::create()
    }

    /// Resolve the session for this request from its session cookie.
    ///
    /// Fails with [`SessionError::NotFound`] when the cookie is absent or its
    /// token no longer resolves to live data.
    async fn resolve(&self, req: &Request) -> Result<Session, SessionError> {
        let id = req
            .cookie(&self.config().cookie_name)
            .map(|cookie| cookie.value().to_string())
            .filter(|value| !value.is_empty())
            .ok_or(SessionError::NotFound)?;
        self.load(&id).await
    }

    /// Write the session identifier into the response as a cookie, honoring
    /// the configured timeout and HttpOnly/Secure flags.
    fn attach_to_response(&self, session: &Session, res: &mut Response) {
        let config = self.config();
        let mut builder = Cookie::build((config.cookie_name.clone(), session.id().to_string()))
            .path("/")
            .http_only(config.http_only)
            .secure(config.secure);
        if config.timeout_secs > 0 {
            builder = builder.max_age(Duration::seconds(config.timeout_secs as i64));
        }
        res.add_cookie(builder.build());
    }
}
