//! Service-level tests over the in-memory store.

use std::sync::Arc;

use boardwalk_engine::{EngineError, RoomService};
use boardwalk_game::{GameError, PendingAction, Phase, PlayerId, RoomCode};
use boardwalk_store::MemoryStore;

const ALICE: PlayerId = PlayerId(1);
const BOB: PlayerId = PlayerId(2);

fn service() -> RoomService<MemoryStore> {
    RoomService::new(MemoryStore::new())
}

async fn playing_room(service: &RoomService<MemoryStore>) -> RoomCode {
    let room = service.create_room(ALICE, "Alice").await.unwrap();
    let code = room.code.clone();
    service.join_room(&code, BOB, "Bob").await.unwrap();
    service.set_ready(&code, ALICE).await.unwrap();
    let room = service.set_ready(&code, BOB).await.unwrap();
    assert_eq!(room.phase, Phase::Playing);
    code
}

#[tokio::test]
async fn test_create_room_persists_and_reloads() {
    let service = service();
    let room = service.create_room(ALICE, "Alice").await.unwrap();
    let loaded = service.load_room(&room.code).await.unwrap();
    assert_eq!(loaded, room);
    assert_eq!(loaded.players[0].name, "Alice");
}

#[tokio::test]
async fn test_unknown_room_is_not_found() {
    let service = service();
    let missing = RoomCode::normalized("ZZZZZZ");
    let err = service.load_room(&missing).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(code) if code == missing));
}

#[tokio::test]
async fn test_join_and_ready_start_the_game() {
    let service = service();
    let code = playing_room(&service).await;
    let room = service.load_room(&code).await.unwrap();
    assert_eq!(room.current_player().id, ALICE);
    assert_eq!(room.pending_action, Some(PendingAction::Roll));
}

#[tokio::test]
async fn test_rejected_intent_leaves_room_unchanged() {
    let service = service();
    let code = playing_room(&service).await;
    let before = service.load_room(&code).await.unwrap();
    let err = service.roll_dice(&code, BOB).await.unwrap_err();
    assert!(matches!(err, EngineError::Game(GameError::NotYourTurn)));
    assert_eq!(service.load_room(&code).await.unwrap(), before);
}

#[tokio::test]
async fn test_roll_records_dice_and_sets_followup() {
    let service = service();
    let code = playing_room(&service).await;
    let room = service.roll_dice(&code, ALICE).await.unwrap();
    let dice = room.last_dice;
    assert!((1..=6).contains(&dice[0]) && (1..=6).contains(&dice[1]));
    assert!(matches!(
        room.pending_action,
        Some(PendingAction::Buy) | Some(PendingAction::EndTurn)
    ));
    // The mutation hit the store, not just the returned copy.
    assert_eq!(service.load_room(&code).await.unwrap().last_dice, dice);
}

#[tokio::test]
async fn test_buy_requires_pending_purchase() {
    let service = service();
    let code = playing_room(&service).await;
    let err = service.buy_property(&code, ALICE).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Game(GameError::ActionNotAvailable)
    ));
}

#[tokio::test]
async fn test_leave_room_is_silent_for_strangers() {
    let service = service();
    let code = playing_room(&service).await;
    // A connection that never joined can still run its teardown path.
    service.leave_room(&code, PlayerId(99)).await.unwrap();
    let room = service.load_room(&code).await.unwrap();
    assert_eq!(room.players.len(), 2);
}

#[tokio::test]
async fn test_concurrent_intents_serialize_per_room() {
    let service = Arc::new(service());
    let code = playing_room(&service).await;
    // Drive the room to a purchase decision with known dice.
    service
        .update(&code, |room| {
            let mut rng = rand::rng();
            room.roll_with(ALICE, [4, 6], &mut rng, boardwalk_engine::now_millis())
        })
        .await
        .unwrap();

    // Two buys race; exactly one may commit.
    let a = {
        let service = Arc::clone(&service);
        let code = code.clone();
        tokio::spawn(async move { service.buy_property(&code, ALICE).await })
    };
    let b = {
        let service = Arc::clone(&service);
        let code = code.clone();
        tokio::spawn(async move { service.buy_property(&code, ALICE).await })
    };
    let results = [a.await.unwrap(), b.await.unwrap()];
    let wins = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1);

    let room = service.load_room(&code).await.unwrap();
    assert_eq!(room.properties.get(&10), Some(&ALICE));
    // Charged once.
    assert_eq!(room.players[0].money, 1500 - 140);
}
