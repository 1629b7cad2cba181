//! The static board: a 20-cell ring and its rent rules.
//!
//! The layout is fixed: 8 streets (4 color groups of 2), 2 railroads,
//! 1 utility, 1 tax cell, 2 chance, 2 community chest, and the four
//! corners (Go, Jail, Free Parking, Go to Jail).

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// Number of cells on the ring.
pub const BOARD_SIZE: u8 = 20;

/// Index of the Go cell.
pub const GO_INDEX: u8 = 0;

/// Index of the Jail cell.
pub const JAIL_INDEX: u8 = 9;

/// Railroad rent by number of railroads the owner holds (1..=4).
const RAILROAD_RENTS: [i64; 4] = [25, 50, 100, 200];

/// What kind of cell this is. Only streets, railroads, and utilities
/// can be owned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    Go,
    Street,
    Railroad,
    Utility,
    Tax,
    Chance,
    CommunityChest,
    Jail,
    FreeParking,
    GoToJail,
}

impl CellKind {
    /// Returns `true` if a player can purchase cells of this kind.
    pub fn is_purchasable(&self) -> bool {
        matches!(self, Self::Street | Self::Railroad | Self::Utility)
    }
}

/// Street color groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorGroup {
    Brown,
    LightBlue,
    Pink,
    Orange,
}

/// One cell on the board. Immutable; cells appear in snapshots (the
/// landed cell, the pending purchase) so they carry their display data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub index: u8,
    pub kind: CellKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<ColorGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rent: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
}

fn plain(index: u8, kind: CellKind, name: &str) -> Cell {
    Cell {
        index,
        kind,
        name: name.to_string(),
        color: None,
        price: None,
        rent: None,
        amount: None,
    }
}

fn street(index: u8, name: &str, color: ColorGroup, price: i64, rent: i64) -> Cell {
    Cell {
        color: Some(color),
        price: Some(price),
        rent: Some(rent),
        ..plain(index, CellKind::Street, name)
    }
}

fn priced(index: u8, kind: CellKind, name: &str, price: i64, rent: i64) -> Cell {
    Cell {
        price: Some(price),
        rent: Some(rent),
        ..plain(index, kind, name)
    }
}

fn tax(index: u8, name: &str, amount: i64) -> Cell {
    Cell {
        amount: Some(amount),
        ..plain(index, CellKind::Tax, name)
    }
}

/// Returns the full board, index 0 (Go) through 19.
pub fn board() -> &'static [Cell] {
    static BOARD: OnceLock<Vec<Cell>> = OnceLock::new();
    BOARD.get_or_init(|| {
        use CellKind::*;
        use ColorGroup::*;
        vec![
            plain(0, Go, "Go"),
            street(1, "Mediterranean Ave", Brown, 60, 6),
            plain(2, CommunityChest, "Community Chest"),
            street(3, "Baltic Ave", Brown, 60, 6),
            tax(4, "Income Tax", 200),
            priced(5, Railroad, "Reading Railroad", 200, 25),
            street(6, "Oriental Ave", LightBlue, 100, 10),
            plain(7, Chance, "Chance"),
            street(8, "Vermont Ave", LightBlue, 100, 10),
            plain(9, Jail, "Jail"),
            street(10, "St. Charles Place", Pink, 140, 14),
            priced(11, Utility, "Electric Company", 150, 0),
            street(12, "States Ave", Pink, 140, 14),
            priced(13, Railroad, "Pennsylvania Railroad", 200, 25),
            plain(14, Chance, "Chance"),
            street(15, "Tennessee Ave", Orange, 180, 18),
            plain(16, CommunityChest, "Community Chest"),
            street(17, "New York Ave", Orange, 200, 20),
            plain(18, FreeParking, "Free Parking"),
            plain(19, GoToJail, "Go to Jail"),
        ]
    })
}

/// Returns the cell at `index`, wrapping modulo the board size.
pub fn cell_at(index: u8) -> &'static Cell {
    &board()[(index % BOARD_SIZE) as usize]
}

/// Rent owed when landing on an owned `cell`.
///
/// Streets have a fixed per-cell rent in this ruleset. Railroads scale
/// with how many railroads the owner holds. Utility rent depends on the
/// dice at resolution time, so this returns 0 for utilities and the
/// caller computes it from the roll.
pub fn rent_for(cell: &Cell, owned_in_group: usize) -> i64 {
    match cell.kind {
        CellKind::Street => cell
            .rent
            .unwrap_or_else(|| cell.price.unwrap_or(0) / 10),
        CellKind::Railroad => RAILROAD_RENTS[owned_in_group.saturating_sub(1).min(3)],
        _ => 0,
    }
}

/// Utility rent for a resolved roll: 4x the dice sum, or 10x when the
/// owner holds every utility on the board.
pub fn utility_rent(dice_sum: i64, owner_utilities: usize) -> i64 {
    if owner_utilities >= 2 {
        dice_sum * 10
    } else {
        dice_sum * 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_board_has_twenty_cells() {
        assert_eq!(board().len(), BOARD_SIZE as usize);
        for (i, cell) in board().iter().enumerate() {
            assert_eq!(cell.index as usize, i);
        }
    }

    #[test]
    fn test_board_has_exactly_one_of_each_corner() {
        let count = |kind: CellKind| board().iter().filter(|c| c.kind == kind).count();
        assert_eq!(count(CellKind::Go), 1);
        assert_eq!(count(CellKind::Jail), 1);
        assert_eq!(count(CellKind::FreeParking), 1);
        assert_eq!(count(CellKind::GoToJail), 1);
        assert_eq!(board()[GO_INDEX as usize].kind, CellKind::Go);
        assert_eq!(board()[JAIL_INDEX as usize].kind, CellKind::Jail);
    }

    #[test]
    fn test_only_streets_railroads_utilities_are_purchasable() {
        for cell in board() {
            if cell.kind.is_purchasable() {
                assert!(cell.price.is_some(), "{} has no price", cell.name);
            } else {
                assert!(cell.price.is_none(), "{} should not be priced", cell.name);
            }
        }
    }

    #[test]
    fn test_cell_at_wraps_modulo_board_size() {
        assert_eq!(cell_at(0).kind, CellKind::Go);
        assert_eq!(cell_at(BOARD_SIZE).kind, CellKind::Go);
        assert_eq!(cell_at(27).index, 7);
    }

    #[test]
    fn test_street_rent_is_fixed() {
        let st_charles = cell_at(10);
        assert_eq!(rent_for(st_charles, 1), 14);
        assert_eq!(rent_for(st_charles, 3), 14);
    }

    #[test]
    fn test_railroad_rent_scales_with_count() {
        let railroad = cell_at(5);
        assert_eq!(rent_for(railroad, 1), 25);
        assert_eq!(rent_for(railroad, 2), 50);
        assert_eq!(rent_for(railroad, 3), 100);
        assert_eq!(rent_for(railroad, 4), 200);
        // Out-of-range counts clamp rather than panic.
        assert_eq!(rent_for(railroad, 0), 25);
        assert_eq!(rent_for(railroad, 9), 200);
    }

    #[test]
    fn test_utility_rent_is_zero_sentinel() {
        let utility = cell_at(11);
        assert_eq!(rent_for(utility, 1), 0);
        assert_eq!(rent_for(utility, 2), 0);
    }

    #[test]
    fn test_utility_rent_multiplies_dice_sum() {
        assert_eq!(utility_rent(7, 1), 28);
        assert_eq!(utility_rent(2, 1), 8);
        // Full-set owner collects tenfold.
        assert_eq!(utility_rent(7, 2), 70);
        assert_eq!(utility_rent(12, 2), 120);
    }
}
