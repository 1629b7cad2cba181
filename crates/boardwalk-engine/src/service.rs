//! The room service: one load → compute → save cycle per operation.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::Mutex as AsyncMutex;

use boardwalk_game::{GameError, PlayerId, Room, RoomCode};
use boardwalk_store::RoomStore;

use crate::EngineError;

/// Attempts at generating an unused room code before giving up.
const CODE_ATTEMPTS: usize = 16;

/// Applies game operations to stored rooms.
///
/// The store is the only copy of a room between operations; nothing is
/// cached. Each operation takes a per-code async lock, loads the room,
/// applies one transition, and saves the result before releasing the
/// lock, so two intents for the same room can never interleave their
/// read-modify-write cycles within this process. (Cross-process safety
/// comes from players of one room being routed to one process; the
/// store does not arbitrate concurrent writers.)
pub struct RoomService<S> {
    store: S,
    locks: StdMutex<HashMap<RoomCode, Arc<AsyncMutex<()>>>>,
}

impl<S: RoomStore> RoomService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            locks: StdMutex::new(HashMap::new()),
        }
    }

    fn room_lock(&self, code: &RoomCode) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(code.clone()).or_default())
    }

    /// Drops this operation's handle on a room lock, removing the map
    /// entry when no other operation holds one. Every handle is cloned
    /// out under the map mutex, so a strong count of 1 here means only
    /// the map itself still points at the lock.
    fn release_lock(&self, code: &RoomCode, lock: Arc<AsyncMutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        drop(lock);
        if locks.get(code).is_some_and(|entry| Arc::strong_count(entry) == 1) {
            locks.remove(code);
        }
    }

    /// Loads, mutates, and saves one room under its lock. The updated
    /// room is returned for snapshotting.
    async fn with_room<F>(&self, code: &RoomCode, f: F) -> Result<Room, EngineError>
    where
        F: FnOnce(&mut Room) -> Result<(), GameError>,
    {
        let lock = self.room_lock(code);
        let result = {
            let _guard = lock.lock().await;
            self.apply(code, f).await
        };
        self.release_lock(code, lock);
        result
    }

    /// The load → compute → save cycle. Caller holds the room lock.
    /// When `f` fails the room is still saved: the expired-disconnect
    /// sweep inside the guards may have changed state even though the
    /// intent itself was rejected.
    async fn apply<F>(&self, code: &RoomCode, f: F) -> Result<Room, EngineError>
    where
        F: FnOnce(&mut Room) -> Result<(), GameError>,
    {
        let bytes = self
            .store
            .load(code)
            .await?
            .ok_or_else(|| EngineError::NotFound(code.clone()))?;
        let mut room: Room = serde_json::from_slice(&bytes)?;
        let outcome = f(&mut room);
        let bytes = serde_json::to_vec(&room)?;
        self.store.save(code, &bytes).await?;
        outcome?;
        Ok(room)
    }

    /// Creates a room with a fresh code and the creator seated.
    pub async fn create_room(
        &self,
        creator: PlayerId,
        name: &str,
    ) -> Result<Room, EngineError> {
        let mut rng = StdRng::from_os_rng();
        for _ in 0..CODE_ATTEMPTS {
            let code = RoomCode::generate(&mut rng);
            let lock = self.room_lock(&code);
            let result = {
                let _guard = lock.lock().await;
                self.seat_creator(&code, creator, name, &mut rng).await
            };
            self.release_lock(&code, lock);
            match result? {
                Some(room) => return Ok(room),
                // Code collision; try another.
                None => continue,
            }
        }
        Err(EngineError::CodeAllocation)
    }

    /// Stores a fresh room under `code` unless the code is taken.
    /// Caller holds the room lock.
    async fn seat_creator(
        &self,
        code: &RoomCode,
        creator: PlayerId,
        name: &str,
        rng: &mut StdRng,
    ) -> Result<Option<Room>, EngineError> {
        if self.store.load(code).await?.is_some() {
            return Ok(None);
        }
        let room = Room::new(code.clone(), creator, name, rng, now_millis());
        let bytes = serde_json::to_vec(&room)?;
        self.store.save(code, &bytes).await?;
        tracing::info!(code = %code, player = %creator, "room created");
        Ok(Some(room))
    }

    /// Joins a lobby or rejoins a running game.
    pub async fn join_room(
        &self,
        code: &RoomCode,
        player: PlayerId,
        name: &str,
    ) -> Result<Room, EngineError> {
        let name = name.to_string();
        self.with_room(code, |room| room.join(player, &name, now_millis()))
            .await
    }

    pub async fn set_ready(&self, code: &RoomCode, player: PlayerId) -> Result<Room, EngineError> {
        self.with_room(code, |room| room.set_ready(player)).await
    }

    pub async fn roll_dice(&self, code: &RoomCode, player: PlayerId) -> Result<Room, EngineError> {
        self.with_room(code, |room| {
            let mut rng = StdRng::from_os_rng();
            room.roll(player, &mut rng, now_millis())
        })
        .await
    }

    pub async fn buy_property(
        &self,
        code: &RoomCode,
        player: PlayerId,
    ) -> Result<Room, EngineError> {
        self.with_room(code, |room| room.buy(player, now_millis()))
            .await
    }

    pub async fn skip_buy(&self, code: &RoomCode, player: PlayerId) -> Result<Room, EngineError> {
        self.with_room(code, |room| room.skip_buy(player, now_millis()))
            .await
    }

    /// `pay` selects bail (token first, then cash) over waiting.
    pub async fn jail_choice(
        &self,
        code: &RoomCode,
        player: PlayerId,
        pay: bool,
    ) -> Result<Room, EngineError> {
        self.with_room(code, |room| room.jail_choice(player, pay, now_millis()))
            .await
    }

    pub async fn end_turn(&self, code: &RoomCode, player: PlayerId) -> Result<Room, EngineError> {
        self.with_room(code, |room| room.end_turn(player, now_millis()))
            .await
    }

    /// Records a disconnect. Infallible at the rules level for known
    /// and unknown players alike, so the gateway can always call it on
    /// connection teardown.
    pub async fn leave_room(
        &self,
        code: &RoomCode,
        player: PlayerId,
    ) -> Result<Room, EngineError> {
        self.with_room(code, |room| room.leave(player, now_millis()))
            .await
    }

    /// Reads a room without mutating it.
    pub async fn load_room(&self, code: &RoomCode) -> Result<Room, EngineError> {
        let bytes = self
            .store
            .load(code)
            .await?
            .ok_or_else(|| EngineError::NotFound(code.clone()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Applies an arbitrary transition under the room lock. Test and
    /// tooling hook; production traffic goes through the named
    /// operations above.
    pub async fn update<F>(&self, code: &RoomCode, f: F) -> Result<Room, EngineError>
    where
        F: FnOnce(&mut Room) -> Result<(), GameError>,
    {
        self.with_room(code, f).await
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardwalk_store::MemoryStore;

    fn lock_count(service: &RoomService<MemoryStore>) -> usize {
        service.locks.lock().unwrap().len()
    }

    #[tokio::test]
    async fn test_lock_map_is_pruned_after_each_operation() {
        let service = RoomService::new(MemoryStore::new());
        let room = service.create_room(PlayerId(1), "Alice").await.unwrap();
        service
            .join_room(&room.code, PlayerId(2), "Bob")
            .await
            .unwrap();
        service.set_ready(&room.code, PlayerId(1)).await.unwrap();
        assert_eq!(lock_count(&service), 0);
    }

    #[tokio::test]
    async fn test_lock_map_is_pruned_after_rejected_intents() {
        let service = RoomService::new(MemoryStore::new());
        let room = service.create_room(PlayerId(1), "Alice").await.unwrap();
        assert!(service.roll_dice(&room.code, PlayerId(1)).await.is_err());
        assert_eq!(lock_count(&service), 0);
    }
}
