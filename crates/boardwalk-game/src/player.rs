//! One seat in a room.

use serde::{Deserialize, Serialize};

use crate::PlayerId;

/// Cash every player starts with.
pub const STARTING_MONEY: i64 = 1500;

/// Display names are capped at this many characters.
pub const MAX_NAME_LEN: usize = 20;

/// Trims and truncates a display name; empty input falls back to "Player".
pub fn normalize_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return "Player".to_string();
    }
    trimmed.chars().take(MAX_NAME_LEN).collect()
}

/// A player's mutable record inside a room.
///
/// Created on join, mutated only by [`Room`](crate::Room) operations,
/// never removed from the roster — bankruptcy and disconnect-timeout
/// mark the seat dead but keep it visible for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub money: i64,
    pub position: u8,
    pub in_jail: bool,
    pub jail_turns_left: u8,
    pub get_out_of_jail_free: u8,
    pub ready: bool,
    pub bankrupt: bool,
    /// Fixed turn-order slot, assigned at join and never reassigned.
    pub order_index: usize,
    pub last_dice: [u8; 2],
    /// Consecutive doubles within the current turn chain (0..=3).
    pub doubles_count: u8,
    /// Epoch-millis of the disconnect, while the rejoin window is open.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disconnected_at: Option<u64>,
}

impl Player {
    /// Creates a fresh seat at Go with starting cash.
    pub fn new(id: PlayerId, name: &str) -> Self {
        Self {
            id,
            name: normalize_name(name),
            money: STARTING_MONEY,
            position: 0,
            in_jail: false,
            jail_turns_left: 0,
            get_out_of_jail_free: 0,
            ready: false,
            bankrupt: false,
            order_index: 0,
            last_dice: [0, 0],
            doubles_count: 0,
            disconnected_at: None,
        }
    }

    /// Effectively bankrupt: the flag is set, or the balance is negative.
    ///
    /// The flag and the balance can disagree — a tax debit drives money
    /// negative without setting the flag (see the room's landing rules) —
    /// so turn advancement and win detection use this combined predicate.
    pub fn is_bankrupt(&self) -> bool {
        self.bankrupt || self.money < 0
    }

    /// Inside the rejoin window after a disconnect.
    pub fn is_disconnected(&self) -> bool {
        self.disconnected_at.is_some()
    }
}
