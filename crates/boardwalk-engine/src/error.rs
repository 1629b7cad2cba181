use boardwalk_game::{GameError, RoomCode};
use boardwalk_store::StoreError;

/// Errors from a room operation.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("room {0} not found")]
    NotFound(RoomCode),

    /// The rules rejected the operation; the room was not modified.
    #[error(transparent)]
    Game(#[from] GameError),

    #[error("store: {0}")]
    Store(#[from] StoreError),

    /// A stored room failed to deserialize.
    #[error("corrupt room record: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// Fresh codes kept colliding with stored rooms.
    #[error("could not allocate an unused room code")]
    CodeAllocation,
}
