//! Session store implementations.

mod memory;
mod traits;

pub use memory::MemoryStore;
pub use traits::SessionStore;

#[cfg(feature = "redis-store")]
mod redis_store;

#[cfg(feature = "redis-store")]
pub use redis_store::RedisStore;

#[cfg(feature = "postgres-store")]
mod postgres_store;

#[cfg(feature = "postgres-store")]
pub use postgres_store::PostgresStore;
