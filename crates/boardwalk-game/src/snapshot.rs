//! Client-facing snapshots.
//!
//! Clients never receive the [`Room`] itself: the decks would leak the
//! draw order and jail-free tokens are private to their holder. The
//! snapshot carries everything a client needs to render the room and
//! nothing it could cheat with.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::board::Cell;
use crate::cards::Card;
use crate::ids::{PlayerId, RoomCode};
use crate::player::Player;
use crate::room::{PendingAction, Phase, Room};

/// A player as other clients see them. Jail-free tokens are omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicPlayer {
    pub id: PlayerId,
    pub name: String,
    pub money: i64,
    pub position: u8,
    pub in_jail: bool,
    pub jail_turns_left: u8,
    pub ready: bool,
    pub bankrupt: bool,
    pub order_index: usize,
    pub last_dice: [u8; 2],
    /// Epoch-millis of the disconnect, `null` while connected. Clients
    /// derive the remaining rejoin window from this.
    pub disconnected_at: Option<u64>,
    pub disconnected: bool,
}

impl From<&Player> for PublicPlayer {
    fn from(p: &Player) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            money: p.money,
            position: p.position,
            in_jail: p.in_jail,
            jail_turns_left: p.jail_turns_left,
            ready: p.ready,
            bankrupt: p.is_bankrupt(),
            order_index: p.order_index,
            last_dice: p.last_dice,
            disconnected_at: p.disconnected_at,
            disconnected: p.is_disconnected(),
        }
    }
}

/// The full room state broadcast after every accepted operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicRoom {
    pub code: RoomCode,
    pub phase: Phase,
    pub players: Vec<PublicPlayer>,
    pub current_player_index: usize,
    pub current_player_id: Option<PlayerId>,
    pub pending_action: Option<PendingAction>,
    pub last_dice: [u8; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landed_cell: Option<Cell>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landed_cell_index: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_buy_cell: Option<Cell>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drawn_card: Option<Card>,
    /// Cell index → owner, stringly keyed in JSON.
    pub properties: BTreeMap<u8, PlayerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner_id: Option<PlayerId>,
}

impl Room {
    /// Builds the redacted snapshot for broadcast.
    pub fn public_snapshot(&self) -> PublicRoom {
        let current_player_id = if self.phase == Phase::Playing {
            self.players.get(self.current_player_index).map(|p| p.id)
        } else {
            None
        };
        PublicRoom {
            code: self.code.clone(),
            phase: self.phase,
            players: self.players.iter().map(PublicPlayer::from).collect(),
            current_player_index: self.current_player_index,
            current_player_id,
            pending_action: self.pending_action,
            last_dice: self.last_dice,
            landed_cell: self.landed_cell.clone(),
            landed_cell_index: self.landed_cell_index,
            pending_buy_cell: self.pending_buy_cell.clone(),
            drawn_card: self.drawn_card.clone(),
            properties: self.properties.clone(),
            winner_id: self.winner_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn lobby_room() -> Room {
        let mut rng = StdRng::seed_from_u64(1);
        Room::new(
            RoomCode::normalized("ABQDEF"),
            PlayerId(1),
            "Alice",
            &mut rng,
            0,
        )
    }

    #[test]
    fn test_snapshot_hides_decks_and_jail_free_tokens() {
        let mut room = lobby_room();
        room.players[0].get_out_of_jail_free = 1;
        let json = serde_json::to_value(room.public_snapshot()).unwrap();
        assert!(json.get("chance_deck").is_none());
        assert!(json.get("chest_deck").is_none());
        assert!(json["players"][0].get("get_out_of_jail_free").is_none());
    }

    #[test]
    fn test_snapshot_has_no_current_player_in_lobby() {
        let room = lobby_room();
        let snap = room.public_snapshot();
        assert_eq!(snap.phase, Phase::Lobby);
        assert_eq!(snap.current_player_id, None);
    }

    #[test]
    fn test_snapshot_carries_turn_slot_and_disconnect_timestamp() {
        let mut room = lobby_room();
        room.players[0].disconnected_at = Some(5_000);
        room.current_player_index = 0;
        let json = serde_json::to_value(room.public_snapshot()).unwrap();
        assert_eq!(json["current_player_index"], 0);
        assert_eq!(json["players"][0]["disconnected_at"], 5_000);
        assert_eq!(json["players"][0]["disconnected"], true);
    }

    #[test]
    fn test_snapshot_disconnect_timestamp_is_null_while_connected() {
        let room = lobby_room();
        let json = serde_json::to_value(room.public_snapshot()).unwrap();
        assert_eq!(json["players"][0]["disconnected_at"], serde_json::Value::Null);
    }

    #[test]
    fn test_snapshot_bankrupt_reflects_negative_balance() {
        let mut room = lobby_room();
        room.players[0].money = -10;
        let snap = room.public_snapshot();
        assert!(snap.players[0].bankrupt);
    }
}
