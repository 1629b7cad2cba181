//! The room aggregate: lobby lifecycle and the turn state machine.
//!
//! A `Room` is the sole unit of persistence and locking. Every operation
//! here is a synchronous transition on the aggregate; the engine crate
//! wraps each one in a load → compute → save cycle under a per-room lock.
//!
//! Operation guards reject with [`GameError`] before any state changes.
//! The one deliberate exception is the expired-disconnect sweep, which
//! runs at the top of every playing-phase operation *before* validation
//! so a timed-out player's stale turn can never be acted on.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::board::{cell_at, rent_for, utility_rent, Cell, CellKind, BOARD_SIZE, GO_INDEX, JAIL_INDEX};
use crate::cards::{chance_cards, community_chest_cards, draw, shuffle, Card, CardEffect};
use crate::error::GameError;
use crate::ids::{PlayerId, RoomCode};
use crate::player::Player;

/// Minimum players required to start a game.
pub const MIN_PLAYERS: usize = 2;

/// Maximum seats in a room.
pub const MAX_PLAYERS: usize = 4;

/// Cost of bailing out of jail.
pub const JAIL_BAIL: i64 = 50;

/// Salary for passing Go (not for landing exactly on it).
pub const PASS_GO_SALARY: i64 = 200;

/// Consecutive doubles that send a player straight to jail.
pub const MAX_DOUBLES: u8 = 3;

/// How long (epoch-millis) a disconnected player may rejoin a running game.
pub const REJOIN_WINDOW_MS: u64 = 30_000;

/// Room lifecycle. Strictly forward-moving: lobby → playing → finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Lobby,
    Playing,
    Finished,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lobby => write!(f, "lobby"),
            Self::Playing => write!(f, "playing"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

/// The single legal next intent for the current player. Everything else
/// is rejected until this resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingAction {
    Roll,
    Buy,
    EndTurn,
    JailChoice,
}

/// One game instance: the aggregate root.
///
/// Fields are public — the room is a data aggregate that serializes
/// whole at the store boundary. Clients never see it directly; they get
/// [`PublicRoom`](crate::PublicRoom) snapshots with the decks redacted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub code: RoomCode,
    pub phase: Phase,
    /// Join order, which is also turn order.
    pub players: Vec<Player>,
    pub current_player_index: usize,
    /// Cell index → owning player. Entries are never removed, only
    /// re-pointed when a rejoin swaps a player's id.
    pub properties: BTreeMap<u8, PlayerId>,
    pub chance_deck: Vec<Card>,
    pub chest_deck: Vec<Card>,
    pub pending_action: Option<PendingAction>,
    pub last_dice: [u8; 2],
    pub landed_cell: Option<Cell>,
    pub landed_cell_index: Option<u8>,
    pub pending_buy_cell: Option<Cell>,
    pub drawn_card: Option<Card>,
    pub winner_id: Option<PlayerId>,
    pub created_at: u64,
}

impl Room {
    /// Creates a lobby-phase room with the creator in seat 0 and fresh
    /// shuffled decks.
    pub fn new(
        code: RoomCode,
        creator: PlayerId,
        creator_name: &str,
        rng: &mut impl Rng,
        now: u64,
    ) -> Self {
        let player = Player::new(creator, creator_name);
        Self {
            code,
            phase: Phase::Lobby,
            players: vec![player],
            current_player_index: 0,
            properties: BTreeMap::new(),
            chance_deck: shuffle(&chance_cards(), rng),
            chest_deck: shuffle(&community_chest_cards(), rng),
            pending_action: None,
            last_dice: [0, 0],
            landed_cell: None,
            landed_cell_index: None,
            pending_buy_cell: None,
            drawn_card: None,
            winner_id: None,
            created_at: now,
        }
    }

    /// Returns the player occupying the current turn slot.
    pub fn current_player(&self) -> &Player {
        &self.players[self.current_player_index]
    }

    fn player_index(&self, id: PlayerId) -> Option<usize> {
        self.players.iter().position(|p| p.id == id)
    }

    // -- Lobby and membership ---------------------------------------------

    /// Joins a lobby, or rejoins a running game.
    ///
    /// Lobby: idempotent per id, capped at [`MAX_PLAYERS`]. Playing: only
    /// a rejoin succeeds — an exact-name match on a seat whose rejoin
    /// window is still open; the seat's id (and its property entries)
    /// rebind to the new connection. Finished rooms reject all joins.
    pub fn join(&mut self, id: PlayerId, name: &str, now: u64) -> Result<(), GameError> {
        let name = crate::player::normalize_name(name);
        match self.phase {
            Phase::Lobby => {
                if self.players.iter().any(|p| p.id == id) {
                    return Ok(());
                }
                if self.players.len() >= MAX_PLAYERS {
                    return Err(GameError::RoomFull);
                }
                let mut player = Player::new(id, &name);
                player.order_index = self.players.len();
                self.players.push(player);
                Ok(())
            }
            Phase::Playing => {
                self.sweep_expired(now);
                if self.phase == Phase::Finished {
                    return Err(GameError::GameFinished);
                }
                let idx = self
                    .players
                    .iter()
                    .position(|p| {
                        p.name == name
                            && p.disconnected_at
                                .is_some_and(|t| now.saturating_sub(t) <= REJOIN_WINDOW_MS)
                    })
                    .ok_or(GameError::RejoinUnavailable)?;
                let old_id = self.players[idx].id;
                self.players[idx].id = id;
                self.players[idx].disconnected_at = None;
                for owner in self.properties.values_mut() {
                    if *owner == old_id {
                        *owner = id;
                    }
                }
                Ok(())
            }
            Phase::Finished => Err(GameError::GameFinished),
        }
    }

    /// Marks a player ready. When at least [`MIN_PLAYERS`] have joined
    /// and every seat is ready, the game starts: phase flips to playing
    /// and seat 0 gets the first pending action.
    pub fn set_ready(&mut self, id: PlayerId) -> Result<(), GameError> {
        if self.phase != Phase::Lobby {
            return Err(GameError::AlreadyStarted);
        }
        let idx = self.player_index(id).ok_or(GameError::UnknownPlayer)?;
        self.players[idx].ready = true;
        if self.players.len() >= MIN_PLAYERS && self.players.iter().all(|p| p.ready) {
            self.phase = Phase::Playing;
            self.current_player_index = 0;
            self.pending_action = Some(entry_action(&self.players[0]));
            self.last_dice = [0, 0];
        }
        Ok(())
    }

    /// Handles a player's connection dropping.
    ///
    /// In the lobby the seat is written off immediately. During play the
    /// seat only gets a disconnect timestamp — the rejoin window is the
    /// failure-tolerance mechanism, so a flaky connection does not end
    /// the game. If the dropper was the current actor, the turn passes on.
    /// Unknown ids are a no-op (the connection never joined).
    pub fn leave(&mut self, id: PlayerId, now: u64) -> Result<(), GameError> {
        let Some(idx) = self.player_index(id) else {
            return Ok(());
        };
        if self.phase == Phase::Playing {
            self.players[idx].disconnected_at = Some(now);
            if self.current_player_index == idx {
                self.current_player_index = next_active_index(&self.players, idx);
                self.pending_action = Some(entry_action(self.current_player()));
            }
            return Ok(());
        }
        self.players[idx].bankrupt = true;
        self.players[idx].money = -1;
        self.finish_if_single_survivor();
        Ok(())
    }

    /// Force-bankrupts every player whose rejoin window has expired.
    ///
    /// Runs at the top of every playing-phase operation, before that
    /// operation's own validation. May finish the game, and may hand the
    /// turn on if the current actor timed out.
    pub fn sweep_expired(&mut self, now: u64) {
        for player in &mut self.players {
            if player
                .disconnected_at
                .is_some_and(|t| now.saturating_sub(t) > REJOIN_WINDOW_MS)
            {
                player.bankrupt = true;
                player.money = -1;
                player.disconnected_at = None;
            }
        }
        if self.finish_if_single_survivor() {
            return;
        }
        let mut hops = 0;
        while self.players[self.current_player_index].is_bankrupt() && hops < self.players.len() {
            self.current_player_index =
                next_active_index(&self.players, self.current_player_index);
            self.pending_action = Some(entry_action(self.current_player()));
            hops += 1;
        }
    }

    // -- Turn actions ------------------------------------------------------

    /// Rolls two dice for the current player and resolves the move.
    pub fn roll(&mut self, id: PlayerId, rng: &mut impl Rng, now: u64) -> Result<(), GameError> {
        let dice = [rng.random_range(1..=6), rng.random_range(1..=6)];
        self.roll_with(id, dice, rng, now)
    }

    /// [`roll`](Self::roll) with the dice chosen by the caller.
    ///
    /// The split keeps movement and landing resolution deterministic for
    /// tests and simulations; `rng` is still needed for card draws.
    pub fn roll_with(
        &mut self,
        id: PlayerId,
        dice: [u8; 2],
        rng: &mut impl Rng,
        now: u64,
    ) -> Result<(), GameError> {
        self.guard_playing(now)?;
        if self.phase == Phase::Finished {
            return Ok(());
        }
        if self.pending_action != Some(PendingAction::Roll) {
            return Err(GameError::ActionNotAvailable);
        }
        let idx = self.current_player_index;
        if self.players[idx].id != id {
            return Err(GameError::NotYourTurn);
        }
        if self.players[idx].is_bankrupt() {
            return Err(GameError::Bankrupt);
        }
        if self.players[idx].in_jail {
            return Err(GameError::InJail);
        }

        let doubles = dice[0] == dice[1];
        self.players[idx].last_dice = dice;
        self.last_dice = dice;
        if doubles {
            self.players[idx].doubles_count += 1;
        } else {
            self.players[idx].doubles_count = 0;
        }

        // Third consecutive double: straight to jail, no movement, no
        // landing action.
        if self.players[idx].doubles_count >= MAX_DOUBLES {
            send_to_jail(&mut self.players[idx]);
            self.pending_action = Some(PendingAction::EndTurn);
            return Ok(());
        }

        let old_position = self.players[idx].position;
        let new_position = (old_position + dice[0] + dice[1]) % BOARD_SIZE;
        self.players[idx].position = new_position;
        self.landed_cell = Some(cell_at(new_position).clone());
        self.landed_cell_index = Some(new_position);

        // Passing Go pays a salary; landing exactly on Go does not (the
        // Go cell's landing action has no cash effect, so no double credit).
        if new_position < old_position && new_position != GO_INDEX {
            self.players[idx].money += PASS_GO_SALARY;
        }

        self.resolve_landing(idx, rng);
        Ok(())
    }

    /// Dispatches the consequences of the cell the player stopped on,
    /// and sets the next pending action.
    fn resolve_landing(&mut self, idx: usize, rng: &mut impl Rng) {
        let cell = cell_at(self.players[idx].position).clone();
        match cell.kind {
            CellKind::Go | CellKind::Jail | CellKind::FreeParking => {
                self.pending_action = Some(PendingAction::EndTurn);
            }
            CellKind::GoToJail => {
                send_to_jail(&mut self.players[idx]);
                self.pending_action = Some(PendingAction::EndTurn);
            }
            CellKind::Tax => {
                // Debit only. Tax does not set the bankrupt flag — the
                // negative balance still counts via the combined
                // predicate at the next sweep or turn advance.
                self.players[idx].money -= cell.amount.unwrap_or(200);
                self.pending_action = Some(PendingAction::EndTurn);
            }
            CellKind::Chance => {
                let card = draw_or_reshuffle(&mut self.chance_deck, chance_cards, rng);
                if let Some(card) = card {
                    self.apply_card(idx, &card);
                    self.drawn_card = Some(card);
                }
                self.pending_action = Some(PendingAction::EndTurn);
            }
            CellKind::CommunityChest => {
                let card = draw_or_reshuffle(&mut self.chest_deck, community_chest_cards, rng);
                if let Some(card) = card {
                    self.apply_card(idx, &card);
                    self.drawn_card = Some(card);
                }
                self.pending_action = Some(PendingAction::EndTurn);
            }
            CellKind::Street | CellKind::Railroad | CellKind::Utility => {
                self.resolve_property_landing(idx, &cell);
            }
        }
    }

    fn resolve_property_landing(&mut self, idx: usize, cell: &Cell) {
        let owner_id = self.properties.get(&cell.index).copied();
        let Some(owner_id) = owner_id else {
            self.pending_action = Some(PendingAction::Buy);
            self.pending_buy_cell = Some(cell.clone());
            return;
        };
        if owner_id == self.players[idx].id {
            self.pending_action = Some(PendingAction::EndTurn);
            return;
        }
        let owner_idx = self.player_index(owner_id);
        let Some(owner_idx) = owner_idx.filter(|&i| !self.players[i].bankrupt) else {
            // Owned by a bankrupt or vanished player: no transfer.
            self.pending_action = Some(PendingAction::EndTurn);
            return;
        };

        let rent = match cell.kind {
            CellKind::Utility => {
                let dice_sum =
                    i64::from(self.players[idx].last_dice[0] + self.players[idx].last_dice[1]);
                utility_rent(dice_sum, self.owned_count(owner_id, CellKind::Utility))
            }
            CellKind::Railroad => rent_for(cell, self.owned_count(owner_id, CellKind::Railroad)),
            _ => rent_for(cell, 1),
        };

        self.players[idx].money -= rent;
        self.players[owner_idx].money += rent;
        if self.players[idx].money < 0 {
            self.players[idx].bankrupt = true;
        }
        self.pending_action = Some(PendingAction::EndTurn);
    }

    fn apply_card(&mut self, idx: usize, card: &Card) {
        match card.effect {
            CardEffect::AdvanceToGo => {
                self.players[idx].position = GO_INDEX;
                // Card-driven salary is independent of pass-Go salary
                // and always applies.
                self.players[idx].money += PASS_GO_SALARY;
            }
            CardEffect::GoToJail => send_to_jail(&mut self.players[idx]),
            CardEffect::Receive => self.players[idx].money += card.amount.unwrap_or(0),
            CardEffect::Pay => {
                self.players[idx].money -= card.amount.unwrap_or(0);
                if self.players[idx].money < 0 {
                    self.players[idx].bankrupt = true;
                }
            }
            CardEffect::GetOutOfJailFree => self.players[idx].get_out_of_jail_free += 1,
        }
    }

    /// Buys the cell awaiting a purchase decision.
    pub fn buy(&mut self, id: PlayerId, now: u64) -> Result<(), GameError> {
        self.guard_playing(now)?;
        if self.phase == Phase::Finished {
            return Ok(());
        }
        if self.pending_action != Some(PendingAction::Buy) {
            return Err(GameError::ActionNotAvailable);
        }
        let idx = self.current_player_index;
        if self.players[idx].id != id {
            return Err(GameError::NotYourTurn);
        }
        if self.players[idx].is_bankrupt() {
            return Err(GameError::Bankrupt);
        }
        let cell = self
            .pending_buy_cell
            .clone()
            .ok_or(GameError::ActionNotAvailable)?;
        if self.properties.contains_key(&cell.index) {
            return Err(GameError::AlreadyOwned);
        }
        let price = cell.price.ok_or(GameError::NotForSale)?;
        if self.players[idx].money < price {
            return Err(GameError::InsufficientFunds);
        }
        self.players[idx].money -= price;
        self.properties.insert(cell.index, id);
        self.pending_action = Some(PendingAction::EndTurn);
        self.pending_buy_cell = None;
        Ok(())
    }

    /// Declines the pending purchase. No economic effect.
    pub fn skip_buy(&mut self, id: PlayerId, now: u64) -> Result<(), GameError> {
        self.guard_playing(now)?;
        if self.phase == Phase::Finished {
            return Ok(());
        }
        if self.pending_action != Some(PendingAction::Buy) {
            return Err(GameError::ActionNotAvailable);
        }
        if self.players[self.current_player_index].id != id {
            return Err(GameError::NotYourTurn);
        }
        self.pending_action = Some(PendingAction::EndTurn);
        self.pending_buy_cell = None;
        Ok(())
    }

    /// Resolves the jailed current player's choice: pay bail (a
    /// get-out-of-jail-free token is consumed before cash) or wait out
    /// another turn.
    pub fn jail_choice(&mut self, id: PlayerId, pay: bool, now: u64) -> Result<(), GameError> {
        self.guard_playing(now)?;
        if self.phase == Phase::Finished {
            return Ok(());
        }
        let idx = self.current_player_index;
        if self.players[idx].id != id {
            return Err(GameError::NotYourTurn);
        }
        if !self.players[idx].in_jail {
            return Err(GameError::NotInJail);
        }
        if pay {
            if self.players[idx].get_out_of_jail_free > 0 {
                self.players[idx].get_out_of_jail_free -= 1;
            } else if self.players[idx].money >= JAIL_BAIL {
                self.players[idx].money -= JAIL_BAIL;
            } else {
                return Err(GameError::InsufficientFunds);
            }
            self.players[idx].in_jail = false;
            self.players[idx].jail_turns_left = 0;
            self.pending_action = Some(PendingAction::Roll);
        } else {
            self.players[idx].jail_turns_left = self.players[idx].jail_turns_left.saturating_sub(1);
            if self.players[idx].jail_turns_left == 0 {
                self.players[idx].in_jail = false;
                self.pending_action = Some(PendingAction::Roll);
            } else {
                self.pending_action = Some(PendingAction::EndTurn);
            }
        }
        Ok(())
    }

    /// Ends the current player's turn.
    ///
    /// A doubles roll (below the jail cap) earns the same player another
    /// roll. Otherwise the turn passes to the next non-bankrupt seat and
    /// the per-turn transients are cleared. Finishes the game when only
    /// one non-bankrupt player remains.
    pub fn end_turn(&mut self, id: PlayerId, now: u64) -> Result<(), GameError> {
        self.guard_playing(now)?;
        if self.phase == Phase::Finished {
            return Ok(());
        }
        if self.pending_action != Some(PendingAction::EndTurn) {
            return Err(GameError::ActionNotAvailable);
        }
        let idx = self.current_player_index;
        if self.players[idx].id != id {
            return Err(GameError::NotYourTurn);
        }

        // A live doubles chain (rolled doubles this turn, below the
        // jail cap) keeps the turn. The counter, not the dice, is the
        // authority: stale dice from a previous turn never re-trigger.
        let chain = self.players[idx].doubles_count;
        if chain > 0 && chain < MAX_DOUBLES {
            self.pending_action = Some(PendingAction::Roll);
            return Ok(());
        }

        self.players[idx].doubles_count = 0;
        self.current_player_index = next_solvent_index(&self.players, idx);
        self.pending_action = Some(entry_action(self.current_player()));
        self.drawn_card = None;
        self.landed_cell = None;
        self.landed_cell_index = None;
        self.finish_if_single_survivor();
        Ok(())
    }

    // -- Internal helpers --------------------------------------------------

    /// Phase gate for turn actions, followed by the expired-disconnect
    /// sweep. After this returns `Ok`, the caller must check for the
    /// sweep having finished the game.
    fn guard_playing(&mut self, now: u64) -> Result<(), GameError> {
        match self.phase {
            Phase::Lobby => Err(GameError::NotStarted),
            Phase::Finished => Err(GameError::GameFinished),
            Phase::Playing => {
                self.sweep_expired(now);
                Ok(())
            }
        }
    }

    /// Ends the game if at most one non-bankrupt player remains.
    /// Returns `true` if the room is (now) finished.
    fn finish_if_single_survivor(&mut self) -> bool {
        let mut alive = self.players.iter().filter(|p| !p.is_bankrupt());
        let winner = alive.next().map(|p| p.id);
        if alive.next().is_some() {
            return false;
        }
        self.phase = Phase::Finished;
        self.winner_id = winner;
        true
    }

    fn owned_count(&self, owner: PlayerId, kind: CellKind) -> usize {
        self.properties
            .iter()
            .filter(|&(&index, &id)| id == owner && cell_at(index).kind == kind)
            .count()
    }
}

/// The action a player faces when their turn begins.
fn entry_action(player: &Player) -> PendingAction {
    if player.in_jail {
        PendingAction::JailChoice
    } else {
        PendingAction::Roll
    }
}

fn send_to_jail(player: &mut Player) {
    player.position = JAIL_INDEX;
    player.in_jail = true;
    player.jail_turns_left = 3;
}

fn draw_or_reshuffle(
    deck: &mut Vec<Card>,
    fresh: fn() -> Vec<Card>,
    rng: &mut impl Rng,
) -> Option<Card> {
    let card = match draw(deck, rng) {
        Some(card) => Some(card),
        None => {
            *deck = shuffle(&fresh(), rng);
            draw(deck, rng)
        }
    };
    if deck.is_empty() {
        *deck = shuffle(&fresh(), rng);
    }
    card
}

/// Index of the next player who can actually act: not bankrupt and not
/// inside a disconnect window. Falls back to `current` when no other
/// seat qualifies.
pub fn next_active_index(players: &[Player], current: usize) -> usize {
    let n = players.len();
    if n == 0 {
        return current;
    }
    let mut next = (current + 1) % n;
    for _ in 0..n {
        let p = &players[next];
        if !p.is_bankrupt() && !p.is_disconnected() {
            return next;
        }
        next = (next + 1) % n;
    }
    current
}

/// Index of the next non-bankrupt player, disconnected or not. Used by
/// turn advancement, where a disconnected-but-in-window player still
/// holds their seat. Falls back to `current`.
pub fn next_solvent_index(players: &[Player], current: usize) -> usize {
    let n = players.len();
    if n == 0 {
        return current;
    }
    let mut next = (current + 1) % n;
    for _ in 0..n {
        if !players[next].is_bankrupt() {
            return next;
        }
        next = (next + 1) % n;
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn seat(id: u64, bankrupt: bool, disconnected: bool) -> Player {
        let mut p = Player::new(PlayerId(id), "p");
        p.bankrupt = bankrupt;
        if disconnected {
            p.disconnected_at = Some(1);
        }
        p
    }

    #[test]
    fn test_next_active_index_skips_bankrupt_and_disconnected() {
        let players = vec![
            seat(1, false, false),
            seat(2, true, false),
            seat(3, false, true),
            seat(4, false, false),
        ];
        assert_eq!(next_active_index(&players, 0), 3);
        assert_eq!(next_active_index(&players, 3), 0);
    }

    #[test]
    fn test_next_active_index_falls_back_to_current() {
        let players = vec![seat(1, false, false), seat(2, true, false)];
        assert_eq!(next_active_index(&players, 0), 0);
    }

    #[test]
    fn test_next_solvent_index_keeps_disconnected_seats() {
        let players = vec![
            seat(1, false, false),
            seat(2, false, true),
            seat(3, true, false),
        ];
        // Disconnected-but-in-window player 2 still holds their turn slot.
        assert_eq!(next_solvent_index(&players, 0), 1);
        assert_eq!(next_solvent_index(&players, 1), 0);
    }

    #[test]
    fn test_room_snapshot_round_trips_through_json() {
        let mut rng = StdRng::seed_from_u64(5);
        let room = Room::new(
            RoomCode::normalized("ABQDEF"),
            PlayerId(1),
            "Alice",
            &mut rng,
            1_000,
        );
        let bytes = serde_json::to_vec(&room).unwrap();
        let decoded: Room = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(room, decoded);
    }
}
