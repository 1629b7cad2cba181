//! Unified error type for the server crate.

use boardwalk_engine::EngineError;
use boardwalk_protocol::ProtocolError;
use boardwalk_store::StoreError;
use boardwalk_transport::TransportError;

/// Top-level error wrapping every layer's failures.
#[derive(Debug, thiserror::Error)]
pub enum BoardwalkError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardwalk_game::RoomCode;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let top: BoardwalkError = err.into();
        assert!(matches!(top, BoardwalkError::Transport(_)));
        assert!(top.to_string().contains("gone"));
    }

    #[test]
    fn test_from_engine_error() {
        let err = EngineError::NotFound(RoomCode::normalized("ABCDEF"));
        let top: BoardwalkError = err.into();
        assert!(matches!(top, BoardwalkError::Engine(_)));
    }
}
