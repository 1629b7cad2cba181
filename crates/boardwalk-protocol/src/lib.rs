//! Wire protocol for Boardwalk.
//!
//! Defines the request/ack/broadcast message set ([`Request`],
//! [`ClientIntent`], [`ServerMessage`]) and the [`Codec`] abstraction
//! used to move them over a transport. Game state appears on the wire
//! only as [`boardwalk_game::PublicRoom`] snapshots.
//!
//! This crate knows nothing about connections or rooms; it only shapes
//! bytes.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{clamp_chat, ClientIntent, Request, ServerMessage, MAX_CHAT_LEN};
