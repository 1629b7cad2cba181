//! The messages that travel over a Boardwalk WebSocket.
//!
//! Clients send a [`Request`]: a sequence number plus one intent. The
//! server answers every request with exactly one [`ServerMessage::Ack`]
//! carrying the same sequence number, and separately broadcasts
//! [`ServerMessage::RoomState`] (and lifecycle events) to the whole
//! room after any accepted mutation.
//!
//! All enums are internally tagged with `"type"` in snake_case, so a
//! roll request is `{"seq": 3, "type": "roll"}` on the wire.

use serde::{Deserialize, Serialize};

use boardwalk_game::{PlayerId, PublicRoom, RoomCode};

/// Chat messages are truncated to this many characters server-side.
pub const MAX_CHAT_LEN: usize = 200;

/// Truncates chat text to [`MAX_CHAT_LEN`] characters.
pub fn clamp_chat(text: &str) -> String {
    text.chars().take(MAX_CHAT_LEN).collect()
}

/// What a client wants to do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientIntent {
    /// Create a room and join it as the first player.
    CreateRoom { name: String },
    /// Join a lobby, or rejoin a running game by name.
    JoinRoom { code: String, name: String },
    SetReady,
    Roll,
    Buy,
    SkipBuy,
    /// Pay bail (or burn a jail-free token) to leave jail now.
    JailPay,
    /// Sit out this jail turn.
    JailWait,
    EndTurn,
    /// Ask for a fresh snapshot of the current room.
    SyncState,
    Chat { text: String },
}

/// One client request: an intent with a client-chosen sequence number,
/// echoed back in the ack so the client can match responses to requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub seq: u64,
    #[serde(flatten)]
    pub intent: ClientIntent,
}

/// Everything the server sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Per-request response. Exactly one per [`Request`], carrying the
    /// request's `seq`. On success `state` holds the resulting snapshot
    /// (and `code` the room code for create/join); on failure `error`
    /// holds a stable snake_case code.
    Ack {
        seq: u64,
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<RoomCode>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        state: Option<PublicRoom>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// Broadcast after every accepted mutation.
    RoomState { state: PublicRoom },

    /// Broadcast once when the lobby flips to playing.
    GameStarted { state: PublicRoom },

    /// Broadcast when a disconnect (not a game move) ends the game.
    GameEnded {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        winner_id: Option<PlayerId>,
        state: PublicRoom,
    },

    /// Relayed chat line.
    Chat {
        player_id: PlayerId,
        name: String,
        text: String,
    },
}

impl ServerMessage {
    /// Successful ack with the resulting room snapshot.
    pub fn ack_ok(seq: u64, state: PublicRoom) -> Self {
        Self::Ack {
            seq,
            ok: true,
            code: Some(state.code.clone()),
            state: Some(state),
            error: None,
        }
    }

    /// Failed ack with a stable error code.
    pub fn ack_err(seq: u64, error: impl Into<String>) -> Self {
        Self::Ack {
            seq,
            ok: false,
            code: None,
            state: None,
            error: Some(error.into()),
        }
    }
}
