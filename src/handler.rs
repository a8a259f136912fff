//! Session middleware for Salvo.

use std::sync::Arc;

use async_trait::async_trait;
use salvo_core::http::StatusCode;
use salvo_core::writing::Text;
use salvo_core::{Depot, FlowCtrl, Handler, Request, Response};

use crate::depot_ext::{SessionDepotExt, STORE_KEY};
use crate::store::SessionStore;

/// Middleware that resolves the request's session before the handler runs and
/// persists it afterwards.
///
/// Per request, in order: resolve the session from the session cookie; when
/// there is none, create a fresh one eagerly and remember to attach its
/// cookie; expose session and store through the depot; run the rest of the
/// chain; then save the session if it is dirty or slide its expiry forward if
/// it is clean. A backend failure during resolution answers 503 without
/// invoking the handler; a failure during the post-handler save or refresh is
/// logged and the response proceeds, since failing user-visible work over a
/// lost session update is the worse trade.
pub struct SessionHandler<S: SessionStore> {
    store: Arc<S>,
}

impl<S: SessionStore> SessionHandler<S> {
    /// Wrap a session store into middleware.
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    /// Handle to the wrapped store.
    pub fn store(&self) -> Arc<S> {
        Arc::clone(&self.store)
    }
}

impl<S: SessionStore> Clone for SessionHandler<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

#[async_trait]
impl<S: SessionStore> Handler for SessionHandler<S> {
    async fn handle(
        &self,
        req: &mut Request,
        depot: &mut Depot,
        res: &mut Response,
        ctrl: &mut FlowCtrl,
    ) {
        // Handlers create, destroy and regenerate sessions through this
        // handle, so it goes in even when resolution fails below.
        let store: Arc<dyn SessionStore> = self.store.clone();
        depot.insert(STORE_KEY, store);

        let (session, is_new) = match self.store.resolve(req).await {
            Ok(mut session) => {
                session.set_dirty(false);
                (session, false)
            }
            Err(err) if err.is_not_found() => (self.store.create(), true),
            Err(err) => {
                tracing::error!(error = %err, "failed to resolve session");
                res.status_code(StatusCode::SERVICE_UNAVAILABLE);
                res.render(Text::Plain("session backend unavailable"));
                ctrl.skip_rest();
                return;
            }
        };
        depot.set_session(session);

        ctrl.call_next(req, depot, res).await;

        // The handler may have taken the session out of the depot after
        // destroying it; in that case there is nothing to persist.
        if let Some(session) = depot.session_mut() {
            if session.is_dirty() {
                match self.store.save(session).await {
                    Ok(()) => session.set_dirty(false),
                    Err(err) => {
                        tracing::error!(
                            session_id = %session.id(),
                            error = %err,
                            "failed to save session"
                        );
                    }
                }
            } else if !is_new {
                if let Err(err) = self.store.refresh_expiry(session).await {
                    tracing::warn!(
                        session_id = %session.id(),
                        error = %err,
                        "failed to refresh session expiry"
                    );
                }
            }

            if is_new {
                self.store.attach_to_response(session, res);
            }
        }
    }
}
