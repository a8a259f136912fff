//! Extension trait for Depot to access the request's session and store.
//!
//! The depot is the typed per-request context: the middleware places the
//! resolved [`Session`] and a handle to the [`SessionStore`] in it, and
//! handlers reach both through this trait instead of any ambient state.

use std::sync::Arc;

use salvo_core::Depot;

use crate::session::Session;
use crate::store::SessionStore;

pub(crate) const SESSION_KEY: &str = "salvo_session_kit::session";
pub(crate) const STORE_KEY: &str = "salvo_session_kit::store";

/// Depot accessors for the request-scoped session and its store.
pub trait SessionDepotExt {
    /// The session resolved (or created) for this request.
    fn session(&self) -> Option<&Session>;

    /// Mutable access to the request's session.
    fn session_mut(&mut self) -> Option<&mut Session>;

    /// Replace the request's session.
    fn set_session(&mut self, session: Session);

    /// Remove the session from the request context. A handler that destroys
    /// its session takes it out of the depot so the middleware performs no
    /// post-handler save or expiry refresh for it.
    fn take_session(&mut self) -> Option<Session>;

    /// Handle to the store backing this request's session, for handlers that
    /// create, destroy or regenerate sessions.
    fn session_store(&self) -> Option<Arc<dyn SessionStore>>;
}

impl SessionDepotExt for Depot {
    fn session(&self) -> Option<&Session> {
        self.get(SESSION_KEY).ok()
    }

    fn session_mut(&mut self) -> Option<&mut Session> {
        self.get_mut(SESSION_KEY).ok()
    }

    fn set_session(&mut self, session: Session) {
        self.insert(SESSION_KEY, session);
    }

    fn take_session(&mut self) -> Option<Session> {
        self.remove(SESSION_KEY).ok()
    }

    fn session_store(&self) -> Option<Arc<dyn SessionStore>> {
        self.get::<Arc<dyn SessionStore>>(STORE_KEY).ok().cloned()
    }
}
