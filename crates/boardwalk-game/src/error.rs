use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A rejected game operation. The room is never mutated when one of
/// these is returned (the expired-disconnect sweep, which runs before
/// validation, is the documented exception).
///
/// Serializes as a snake_case string so rejections can ride inside acks
/// unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameError {
    #[error("room is full")]
    RoomFull,

    #[error("no rejoinable seat for that name")]
    RejoinUnavailable,

    #[error("game has already started")]
    AlreadyStarted,

    #[error("game has not started")]
    NotStarted,

    #[error("game is finished")]
    GameFinished,

    #[error("player is not in this room")]
    UnknownPlayer,

    #[error("not your turn")]
    NotYourTurn,

    #[error("that action is not available right now")]
    ActionNotAvailable,

    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("player is in jail")]
    InJail,

    #[error("player is not in jail")]
    NotInJail,

    #[error("player is bankrupt")]
    Bankrupt,

    #[error("property is already owned")]
    AlreadyOwned,

    #[error("cell cannot be purchased")]
    NotForSale,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_as_snake_case_string() {
        assert_eq!(
            serde_json::to_string(&GameError::NotYourTurn).unwrap(),
            "\"not_your_turn\""
        );
        assert_eq!(
            serde_json::to_string(&GameError::InsufficientFunds).unwrap(),
            "\"insufficient_funds\""
        );
    }

    #[test]
    fn test_display_is_human_readable() {
        assert_eq!(GameError::RoomFull.to_string(), "room is full");
    }
}
