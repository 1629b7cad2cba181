//! Redis-backed room storage.

use std::time::Duration;

use redis::AsyncCommands;
use tokio::sync::Mutex;

use boardwalk_game::RoomCode;

use crate::{RoomStore, StoreError};

/// Rooms expire after a day of inactivity; every save refreshes the TTL.
const ROOM_TTL_SECS: u64 = 86_400;

/// How long startup waits for Redis to answer a ping before the server
/// falls back to the in-memory store.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Durable room storage on Redis.
///
/// The connection manager is created lazily and rebuilt after any
/// failure: on error the slot is reset to `None` so the next call
/// reconnects. Unlike a cache, errors propagate to the caller — a room
/// write that did not happen must fail the operation that produced it.
pub struct RedisStore {
    client: redis::Client,
    connection: Mutex<Option<redis::aio::ConnectionManager>>,
}

impl RedisStore {
    /// Opens a client and verifies the server responds to a ping within
    /// [`CONNECT_TIMEOUT`].
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let store = Self {
            client,
            connection: Mutex::new(None),
        };
        match tokio::time::timeout(CONNECT_TIMEOUT, store.ping()).await {
            Ok(result) => result?,
            Err(_) => return Err(StoreError::ConnectTimeout(CONNECT_TIMEOUT)),
        }
        Ok(store)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut guard = self.ensure_connection().await?;
        let Some(conn) = guard.as_mut() else {
            return Ok(());
        };
        let result: redis::RedisResult<()> = redis::cmd("PING").query_async(conn).await;
        result?;
        Ok(())
    }

    fn key(code: &RoomCode) -> String {
        format!("room:{code}")
    }

    async fn ensure_connection(
        &self,
    ) -> Result<tokio::sync::MutexGuard<'_, Option<redis::aio::ConnectionManager>>, StoreError>
    {
        let mut guard = self.connection.lock().await;
        if guard.is_none() {
            *guard = Some(self.client.get_connection_manager().await?);
        }
        Ok(guard)
    }
}

impl RoomStore for RedisStore {
    async fn save(&self, code: &RoomCode, bytes: &[u8]) -> Result<(), StoreError> {
        let mut guard = self.ensure_connection().await?;
        let Some(conn) = guard.as_mut() else {
            return Ok(());
        };
        let result: redis::RedisResult<()> = conn.set_ex(Self::key(code), bytes, ROOM_TTL_SECS).await;
        if let Err(err) = result {
            tracing::warn!(code = %code, "room save failed: {err}");
            *guard = None;
            return Err(err.into());
        }
        Ok(())
    }

    async fn load(&self, code: &RoomCode) -> Result<Option<Vec<u8>>, StoreError> {
        let mut guard = self.ensure_connection().await?;
        let Some(conn) = guard.as_mut() else {
            return Ok(None);
        };
        match conn.get::<_, Option<Vec<u8>>>(Self::key(code)).await {
            Ok(value) => Ok(value),
            Err(err) => {
                tracing::warn!(code = %code, "room load failed: {err}");
                *guard = None;
                Err(err.into())
            }
        }
    }

    async fn delete(&self, code: &RoomCode) -> Result<(), StoreError> {
        let mut guard = self.ensure_connection().await?;
        let Some(conn) = guard.as_mut() else {
            return Ok(());
        };
        match conn.del::<_, ()>(Self::key(code)).await {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::warn!(code = %code, "room delete failed: {err}");
                *guard = None;
                Err(err.into())
            }
        }
    }
}
