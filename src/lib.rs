//! # salvo-session-kit
//!
//! Server-side session management and distributed request throttling for the
//! Salvo web framework.
//!
//! Incoming requests carry an opaque session token in a cookie; the
//! middleware resolves it to a mutable key/value [`Session`], tracks whether
//! the handler modified it, and persists it to one of several interchangeable
//! backing stores on response. A companion [`RateLimitHandler`] enforces a
//! request quota shared across server processes through an atomic redis
//! counter.
//!
//! ## Features
//!
//! - **Pluggable storage backends**: in-process [`MemoryStore`] for tests,
//!   [`RedisStore`] with server-side expiry, [`PostgresStore`] with an expiry
//!   column. All implement the [`SessionStore`] capability interface.
//! - **Dirty tracking**: clean sessions only get their expiry window slid
//!   forward; nothing is rewritten unless the handler changed something.
//! - **Fixation defense**: stores can regenerate a session's identifier in
//!   place after a trust-boundary crossing such as login.
//! - **Distributed throttling**: one atomic increment-with-conditional-expiry
//!   script per request, with `X-RateLimit-*` headers and fail-closed 429/503
//!   behavior.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use salvo::prelude::*;
//! use salvo_session_kit::{MemoryStore, SessionDepotExt, SessionHandler};
//!
//! #[tokio::main]
//! async fn main() {
//!     let router = Router::new()
//!         .hoop(SessionHandler::new(MemoryStore::new()))
//!         .goal(index);
//!
//!     Server::new(TcpListener::new("127.0.0.1:5800").bind().await)
//!         .serve(router)
//!         .await;
//! }
//!
//! #[handler]
//! async fn index(depot: &mut Depot) -> String {
//!     let session = depot.session_mut().unwrap();
//!     let visits: i64 = session.get("visits").unwrap_or(0);
//!     session.set("visits", visits + 1);
//!     format!("visits: {}", visits + 1)
//! }
//! ```

pub mod config;
pub mod error;
pub mod handler;
pub mod session;
pub mod store;

pub use config::StoreConfig;
pub use error::SessionError;
pub use handler::SessionHandler;
pub use session::Session;
pub use store::{MemoryStore, SessionStore};

#[cfg(feature = "redis-store")]
pub use store::RedisStore;

#[cfg(feature = "postgres-store")]
pub use store::PostgresStore;

#[cfg(feature = "redis-store")]
pub mod throttle;

#[cfg(feature = "redis-store")]
pub use throttle::RateLimitHandler;

/// Extension trait for Depot to access the request's session and store.
pub mod depot_ext;
pub use depot_ext::SessionDepotExt;
