//! Identity types: players and room codes.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// A unique identifier for a player.
///
/// Derived from the player's connection, so it changes when a player
/// drops and rejoins — the rejoin path rebinds the seat (and any owned
/// properties) to the new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// Characters allowed in a room code. Visually ambiguous characters
/// (0/O, 1/I) are excluded so codes survive being read out loud.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of a room code.
pub const CODE_LEN: usize = 6;

/// A six-character room code, the address of one game instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Generates a fresh random code.
    pub fn generate(rng: &mut impl Rng) -> Self {
        let code = (0..CODE_LEN)
            .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    /// Normalizes client input into code form: trimmed, uppercased,
    /// truncated to six characters. Codes that were never issued simply
    /// won't resolve to a room.
    pub fn normalized(input: &str) -> Self {
        let code: String = input.trim().to_ascii_uppercase().chars().take(CODE_LEN).collect();
        Self(code)
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
