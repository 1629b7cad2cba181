//! End-to-end tests over real WebSocket connections and the in-memory
//! store.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use boardwalk::BoardwalkServer;

async fn spawn_server() -> SocketAddr {
    let server = BoardwalkServer::builder()
        .bind("127.0.0.1:0")
        .build()
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr
}

struct TestClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .unwrap();
        Self { ws }
    }

    async fn send(&mut self, value: Value) {
        self.ws
            .send(Message::Text(value.to_string().into()))
            .await
            .unwrap();
    }

    /// Next server message as JSON.
    async fn recv(&mut self) -> Value {
        loop {
            let msg = tokio::time::timeout(std::time::Duration::from_secs(5), self.ws.next())
                .await
                .expect("timed out waiting for server message")
                .expect("connection closed")
                .unwrap();
            match msg {
                Message::Binary(data) => return serde_json::from_slice(&data).unwrap(),
                Message::Text(text) => return serde_json::from_str(&text).unwrap(),
                _ => continue,
            }
        }
    }

    /// Skips messages until one with the given type arrives.
    async fn recv_type(&mut self, ty: &str) -> Value {
        loop {
            let msg = self.recv().await;
            if msg["type"] == ty {
                return msg;
            }
        }
    }

    /// Sends a request and waits for its ack, skipping broadcasts.
    async fn request(&mut self, value: Value) -> Value {
        let seq = value["seq"].clone();
        self.send(value).await;
        loop {
            let msg = self.recv().await;
            if msg["type"] == "ack" && msg["seq"] == seq {
                return msg;
            }
        }
    }
}

/// Creates a room with `creator`, joins `joiner`, readies both. Returns
/// the room code.
async fn start_game(creator: &mut TestClient, joiner: &mut TestClient) -> String {
    let ack = creator
        .request(json!({"seq": 1, "type": "create_room", "name": "Alice"}))
        .await;
    assert_eq!(ack["ok"], true);
    let code = ack["code"].as_str().unwrap().to_string();

    let ack = joiner
        .request(json!({"seq": 1, "type": "join_room", "code": code, "name": "Bob"}))
        .await;
    assert_eq!(ack["ok"], true);

    creator
        .request(json!({"seq": 2, "type": "set_ready"}))
        .await;
    let ack = joiner.request(json!({"seq": 2, "type": "set_ready"})).await;
    assert_eq!(ack["state"]["phase"], "playing");
    code
}

#[tokio::test]
async fn test_create_room_acks_with_code_and_lobby_state() {
    let addr = spawn_server().await;
    let mut client = TestClient::connect(addr).await;

    let ack = client
        .request(json!({"seq": 7, "type": "create_room", "name": "Alice"}))
        .await;
    assert_eq!(ack["ok"], true);
    assert_eq!(ack["code"].as_str().unwrap().len(), 6);
    assert_eq!(ack["state"]["phase"], "lobby");
    assert_eq!(ack["state"]["players"][0]["name"], "Alice");
}

#[tokio::test]
async fn test_join_unknown_room_is_rejected() {
    let addr = spawn_server().await;
    let mut client = TestClient::connect(addr).await;

    let ack = client
        .request(json!({"seq": 1, "type": "join_room", "code": "ZZZZZZ", "name": "Bob"}))
        .await;
    assert_eq!(ack["ok"], false);
    assert_eq!(ack["error"], "room_not_found");
}

#[tokio::test]
async fn test_intents_outside_a_room_are_rejected() {
    let addr = spawn_server().await;
    let mut client = TestClient::connect(addr).await;

    let ack = client.request(json!({"seq": 1, "type": "roll"})).await;
    assert_eq!(ack["ok"], false);
    assert_eq!(ack["error"], "not_in_room");
}

#[tokio::test]
async fn test_all_ready_starts_game_and_notifies_everyone() {
    let addr = spawn_server().await;
    let mut alice = TestClient::connect(addr).await;
    let mut bob = TestClient::connect(addr).await;

    start_game(&mut alice, &mut bob).await;

    let started = alice.recv_type("game_started").await;
    assert_eq!(started["state"]["phase"], "playing");
    let started = bob.recv_type("game_started").await;
    assert_eq!(started["state"]["pending_action"], "roll");
}

#[tokio::test]
async fn test_roll_out_of_turn_is_rejected() {
    let addr = spawn_server().await;
    let mut alice = TestClient::connect(addr).await;
    let mut bob = TestClient::connect(addr).await;
    start_game(&mut alice, &mut bob).await;

    // Alice (seat 0) goes first; Bob's roll must bounce.
    let ack = bob.request(json!({"seq": 3, "type": "roll"})).await;
    assert_eq!(ack["ok"], false);
    assert_eq!(ack["error"], "not_your_turn");
}

#[tokio::test]
async fn test_roll_broadcasts_room_state_to_other_players() {
    let addr = spawn_server().await;
    let mut alice = TestClient::connect(addr).await;
    let mut bob = TestClient::connect(addr).await;
    start_game(&mut alice, &mut bob).await;
    bob.recv_type("game_started").await;

    let ack = alice.request(json!({"seq": 3, "type": "roll"})).await;
    assert_eq!(ack["ok"], true);
    let dice = ack["state"]["last_dice"].clone();

    // Bob sees the same dice without asking.
    let update = bob.recv_type("room_state").await;
    assert_eq!(update["state"]["last_dice"], dice);
}

#[tokio::test]
async fn test_chat_relays_to_the_room() {
    let addr = spawn_server().await;
    let mut alice = TestClient::connect(addr).await;
    let mut bob = TestClient::connect(addr).await;
    start_game(&mut alice, &mut bob).await;

    alice
        .send(json!({"seq": 5, "type": "chat", "text": "good luck"}))
        .await;

    let chat = bob.recv_type("chat").await;
    assert_eq!(chat["name"], "Alice");
    assert_eq!(chat["text"], "good luck");

    // Chat is fire-and-forget: the next ack on Alice's wire belongs to
    // the follow-up request, not the chat.
    alice.send(json!({"seq": 6, "type": "sync_state"})).await;
    loop {
        let msg = alice.recv().await;
        if msg["type"] == "ack" {
            assert_eq!(msg["seq"], 6);
            break;
        }
    }
}

#[tokio::test]
async fn test_chat_name_is_trimmed_and_capped() {
    let addr = spawn_server().await;
    let mut alice = TestClient::connect(addr).await;
    let mut bob = TestClient::connect(addr).await;

    let ack = alice
        .request(json!({
            "seq": 1,
            "type": "create_room",
            "name": "  A very long name that runs past the cap  ",
        }))
        .await;
    let code = ack["code"].as_str().unwrap().to_string();
    let ack = bob
        .request(json!({"seq": 1, "type": "join_room", "code": code, "name": "Bob"}))
        .await;
    assert_eq!(ack["ok"], true);

    alice
        .send(json!({"seq": 2, "type": "chat", "text": "hi"}))
        .await;

    // The relayed line carries the same normalized name the roster
    // shows, never the raw client string.
    let chat = bob.recv_type("chat").await;
    assert_eq!(chat["name"], "A very long name tha");
}

#[tokio::test]
async fn test_sync_state_returns_current_snapshot() {
    let addr = spawn_server().await;
    let mut alice = TestClient::connect(addr).await;
    let mut bob = TestClient::connect(addr).await;
    let code = start_game(&mut alice, &mut bob).await;

    let ack = alice.request(json!({"seq": 9, "type": "sync_state"})).await;
    assert_eq!(ack["ok"], true);
    assert_eq!(ack["state"]["code"], code);
    assert_eq!(ack["state"]["phase"], "playing");
}

#[tokio::test]
async fn test_disconnect_marks_seat_and_notifies_room() {
    let addr = spawn_server().await;
    let mut alice = TestClient::connect(addr).await;
    let mut bob = TestClient::connect(addr).await;
    start_game(&mut alice, &mut bob).await;

    drop(bob);

    // Bob's seat shows as disconnected but the game keeps going while
    // his rejoin window is open.
    loop {
        let update = alice.recv_type("room_state").await;
        if update["state"]["players"][1]["disconnected"] == true {
            assert_eq!(update["state"]["phase"], "playing");
            break;
        }
    }
}

#[tokio::test]
async fn test_undecodable_frames_are_ignored() {
    let addr = spawn_server().await;
    let mut client = TestClient::connect(addr).await;

    client
        .ws
        .send(Message::Text("not json".into()))
        .await
        .unwrap();

    // The connection survives and still serves requests.
    let ack = client
        .request(json!({"seq": 1, "type": "create_room", "name": "Alice"}))
        .await;
    assert_eq!(ack["ok"], true);
}
