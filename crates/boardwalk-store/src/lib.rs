//! Room persistence and cross-process fan-out.
//!
//! Rooms are stored as opaque byte blobs keyed by room code. The
//! [`RoomStore`] trait has two implementations: [`RedisStore`] for
//! durability across server restarts, and [`MemoryStore`] as the
//! single-process fallback when Redis is unreachable at startup.
//! [`Store`] picks between them once, at connect time.
//!
//! [`Fanout`] is the companion concern: a Redis pub/sub channel that
//! relays room broadcasts between server processes sharing one store,
//! so players connected to different processes see the same game.

mod error;
mod fanout;
mod memory;
mod redis_store;

use boardwalk_game::RoomCode;

pub use error::StoreError;
pub use fanout::{Fanout, FanoutMessage};
pub use memory::MemoryStore;
pub use redis_store::RedisStore;

/// Keyed blob storage for serialized rooms.
///
/// `Err` means the backend failed, not that the key is absent; a miss
/// is `Ok(None)`. Callers must not treat a failed save as committed.
pub trait RoomStore: Send + Sync + 'static {
    fn save(
        &self,
        code: &RoomCode,
        bytes: &[u8],
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    fn load(
        &self,
        code: &RoomCode,
    ) -> impl std::future::Future<Output = Result<Option<Vec<u8>>, StoreError>> + Send;

    fn delete(
        &self,
        code: &RoomCode,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
}

/// The store actually used by a server: Redis when available, memory
/// otherwise. The choice is made once at startup and never revisited.
pub enum Store {
    Memory(MemoryStore),
    Redis(RedisStore),
}

impl Store {
    /// Connects to Redis at `url`, falling back to an in-memory store
    /// if the URL is absent or Redis does not answer a ping in time.
    /// The fallback is logged once; rooms then live only as long as
    /// this process.
    pub async fn connect(url: Option<&str>) -> Self {
        let Some(url) = url else {
            tracing::info!("no redis url configured, using in-memory room store");
            return Self::Memory(MemoryStore::new());
        };
        match RedisStore::connect(url).await {
            Ok(store) => {
                tracing::info!("connected to redis room store");
                Self::Redis(store)
            }
            Err(err) => {
                tracing::warn!("redis unavailable ({err}), using in-memory room store");
                Self::Memory(MemoryStore::new())
            }
        }
    }

    /// Whether rooms survive a process restart.
    pub fn is_durable(&self) -> bool {
        matches!(self, Self::Redis(_))
    }
}

impl RoomStore for Store {
    async fn save(&self, code: &RoomCode, bytes: &[u8]) -> Result<(), StoreError> {
        match self {
            Self::Memory(s) => s.save(code, bytes).await,
            Self::Redis(s) => s.save(code, bytes).await,
        }
    }

    async fn load(&self, code: &RoomCode) -> Result<Option<Vec<u8>>, StoreError> {
        match self {
            Self::Memory(s) => s.load(code).await,
            Self::Redis(s) => s.load(code).await,
        }
    }

    async fn delete(&self, code: &RoomCode) -> Result<(), StoreError> {
        match self {
            Self::Memory(s) => s.delete(code).await,
            Self::Redis(s) => s.delete(code).await,
        }
    }
}
