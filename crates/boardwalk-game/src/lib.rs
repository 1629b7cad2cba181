//! Server-authoritative game rules for Boardwalk.
//!
//! Everything in this crate is pure domain logic: no I/O, no async, no
//! clocks. Randomness comes in through [`rand::Rng`] parameters and the
//! current time comes in as epoch milliseconds, so every transition is
//! reproducible in tests.
//!
//! # Key types
//!
//! - [`Room`] — the aggregate root: lobby, turn state machine, win detection
//! - [`Player`] — one seat in a room
//! - [`Cell`] / [`board`] — the static 20-cell ring and rent rules
//! - [`Card`] — chance / community-chest cards and their effects
//! - [`PublicRoom`] — the redacted snapshot sent to clients
//! - [`GameError`] — validation rejections (no state is mutated on `Err`)

mod board;
mod cards;
mod error;
mod ids;
mod player;
mod room;
mod snapshot;

pub use board::{
    board, cell_at, rent_for, utility_rent, Cell, CellKind, ColorGroup, BOARD_SIZE, GO_INDEX,
    JAIL_INDEX,
};
pub use cards::{chance_cards, community_chest_cards, draw, shuffle, Card, CardEffect};
pub use error::GameError;
pub use ids::{PlayerId, RoomCode};
pub use player::{normalize_name, Player, MAX_NAME_LEN, STARTING_MONEY};
pub use room::{
    next_active_index, next_solvent_index, PendingAction, Phase, Room, JAIL_BAIL, MAX_DOUBLES,
    MAX_PLAYERS, MIN_PLAYERS, PASS_GO_SALARY, REJOIN_WINDOW_MS,
};
pub use snapshot::{PublicPlayer, PublicRoom};
