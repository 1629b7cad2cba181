//! Chance and community-chest card decks.
//!
//! A deck is a consumable ordering over a fixed multiset: cards are
//! drawn without replacement, and when a deck runs dry the room deals
//! itself a freshly shuffled full set. Card values persist; card
//! identity does not.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// What a card does when drawn. Effects are applied server-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardEffect {
    AdvanceToGo,
    GoToJail,
    Receive,
    Pay,
    GetOutOfJailFree,
}

/// One card: display text plus its server-side effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub text: String,
    pub effect: CardEffect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
}

fn card(id: &str, text: &str, effect: CardEffect, amount: Option<i64>) -> Card {
    Card {
        id: id.to_string(),
        text: text.to_string(),
        effect,
        amount,
    }
}

/// The full chance deck, in definition order.
pub fn chance_cards() -> Vec<Card> {
    use CardEffect::*;
    vec![
        card("ch1", "Advance to Go. Collect $200.", AdvanceToGo, None),
        card("ch2", "Bank pays you dividend of $200.", Receive, Some(200)),
        card("ch3", "Go to Jail. Do not pass Go.", GoToJail, None),
        card("ch4", "Pay poor tax of $100.", Pay, Some(100)),
        card(
            "ch5",
            "You have won a crossword competition. Collect $100.",
            Receive,
            Some(100),
        ),
        card(
            "ch6",
            "Get out of Jail Free (hold until needed).",
            GetOutOfJailFree,
            None,
        ),
    ]
}

/// The full community-chest deck, in definition order.
pub fn community_chest_cards() -> Vec<Card> {
    use CardEffect::*;
    vec![
        card("cc1", "Advance to Go. Collect $200.", AdvanceToGo, None),
        card("cc2", "Bank error in your favor. Collect $200.", Receive, Some(200)),
        card("cc3", "Go to Jail. Do not pass Go.", GoToJail, None),
        card("cc4", "Doctor's fees. Pay $100.", Pay, Some(100)),
        card("cc5", "From sale of stock you get $50.", Receive, Some(50)),
        card("cc6", "Holiday fund matures. Receive $100.", Receive, Some(100)),
    ]
}

/// Returns a uniformly shuffled copy of `cards`. The input is not mutated.
pub fn shuffle(cards: &[Card], rng: &mut impl Rng) -> Vec<Card> {
    let mut deck = cards.to_vec();
    deck.shuffle(rng);
    deck
}

/// Removes and returns one uniformly random card, or `None` if the deck
/// is empty. The caller is responsible for reshuffling a fresh full deck
/// before the next draw.
pub fn draw(deck: &mut Vec<Card>, rng: &mut impl Rng) -> Option<Card> {
    if deck.is_empty() {
        return None;
    }
    let idx = rng.random_range(0..deck.len());
    Some(deck.swap_remove(idx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sorted_ids(cards: &[Card]) -> Vec<&str> {
        let mut ids: Vec<&str> = cards.iter().map(|c| c.id.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn test_shuffle_preserves_multiset() {
        let mut rng = StdRng::seed_from_u64(3);
        let original = chance_cards();
        let shuffled = shuffle(&original, &mut rng);
        assert_eq!(sorted_ids(&original), sorted_ids(&shuffled));
        // Input untouched.
        assert_eq!(original, chance_cards());
    }

    #[test]
    fn test_draw_without_replacement_exhausts_deck() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut deck = shuffle(&community_chest_cards(), &mut rng);
        let mut seen = Vec::new();
        while let Some(card) = draw(&mut deck, &mut rng) {
            seen.push(card);
        }
        // Every card drawn exactly once before the deck empties.
        assert_eq!(sorted_ids(&seen), sorted_ids(&community_chest_cards()));
        assert!(deck.is_empty());
    }

    #[test]
    fn test_draw_from_empty_deck_returns_none() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut deck = Vec::new();
        assert_eq!(draw(&mut deck, &mut rng), None);
    }
}
