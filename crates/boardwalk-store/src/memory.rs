//! Process-local fallback store.

use std::collections::HashMap;
use std::sync::Mutex;

use boardwalk_game::RoomCode;

use crate::{RoomStore, StoreError};

/// A `HashMap` behind a mutex. Rooms vanish when the process exits and
/// are invisible to other processes, which is acceptable for local
/// development and as a degraded mode when Redis is down.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rooms: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RoomStore for MemoryStore {
    async fn save(&self, code: &RoomCode, bytes: &[u8]) -> Result<(), StoreError> {
        let mut rooms = self.rooms.lock().unwrap_or_else(|e| e.into_inner());
        rooms.insert(code.as_str().to_string(), bytes.to_vec());
        Ok(())
    }

    async fn load(&self, code: &RoomCode) -> Result<Option<Vec<u8>>, StoreError> {
        let rooms = self.rooms.lock().unwrap_or_else(|e| e.into_inner());
        Ok(rooms.get(code.as_str()).cloned())
    }

    async fn delete(&self, code: &RoomCode) -> Result<(), StoreError> {
        let mut rooms = self.rooms.lock().unwrap_or_else(|e| e.into_inner());
        rooms.remove(code.as_str());
        Ok(())
    }
}
