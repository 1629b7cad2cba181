//! Orchestration between the rules in `boardwalk-game` and the storage
//! in `boardwalk-store`.
//!
//! [`RoomService`] owns no room state. Every operation is a keyed
//! load → compute → save cycle under a per-room async lock, which makes
//! the store the single source of truth and lets a server restart (or a
//! second process over Redis) pick up any room mid-game.

mod error;
mod service;

pub use error::EngineError;
pub use service::{now_millis, RoomService};
