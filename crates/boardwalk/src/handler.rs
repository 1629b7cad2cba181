//! Per-connection handler: intent dispatch, acks, and broadcasts.
//!
//! Each accepted connection gets one task running [`handle_connection`]
//! plus a writer task draining the connection's outbound queue. The
//! reader loop decodes [`Request`]s, calls the engine, queues the ack,
//! and broadcasts the updated room to every watcher. When the loop ends
//! for any reason the teardown path records the disconnect in the room,
//! which is what arms the rejoin window.

use std::sync::Arc;

use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};

use boardwalk_engine::EngineError;
use boardwalk_game::{normalize_name, Phase, PlayerId, Room, RoomCode};
use boardwalk_protocol::{clamp_chat, ClientIntent, Codec, Request, ServerMessage};
use boardwalk_transport::{Connection, ConnectionId, WebSocketConnection};

use crate::server::ServerState;
use crate::BoardwalkError;

/// What this connection has told us about itself.
struct Session {
    room: Option<RoomCode>,
    name: Option<String>,
}

/// Handles a single connection from accept to teardown.
pub(crate) async fn handle_connection(
    conn: WebSocketConnection,
    state: Arc<ServerState>,
) -> Result<(), BoardwalkError> {
    let conn_id = conn.id();
    let player = PlayerId(conn_id.into_inner());
    tracing::debug!(%conn_id, "handling new connection");

    // All outbound traffic (acks and broadcasts) funnels through one
    // queue so ordering is preserved per connection.
    let (tx, mut rx) = unbounded_channel::<Vec<u8>>();
    let writer_conn = conn.clone();
    let writer = tokio::spawn(async move {
        while let Some(bytes) = rx.recv().await {
            if writer_conn.send(&bytes).await.is_err() {
                break;
            }
        }
    });

    let mut session = Session {
        room: None,
        name: None,
    };

    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%player, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%player, error = %e, "recv error");
                break;
            }
        };

        let request: Request = match state.codec.decode(&data) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(%player, error = %e, "undecodable request dropped");
                continue;
            }
        };

        handle_request(&state, &tx, &mut session, conn_id, player, request).await;
    }

    // Teardown: the room records the disconnect, everyone else learns
    // about it, and a disconnect that ends the game announces a winner.
    if let Some(code) = session.room.take() {
        state.registry.leave(&code, conn_id);
        match state.engine.leave_room(&code, player).await {
            Ok(room) => {
                let snapshot = room.public_snapshot();
                broadcast(
                    &state,
                    &code,
                    &ServerMessage::RoomState {
                        state: snapshot.clone(),
                    },
                )
                .await;
                if room.phase == Phase::Finished {
                    broadcast(
                        &state,
                        &code,
                        &ServerMessage::GameEnded {
                            winner_id: room.winner_id,
                            state: snapshot,
                        },
                    )
                    .await;
                }
            }
            Err(e) => tracing::debug!(%player, error = %e, "disconnect record failed"),
        }
    }

    drop(tx);
    let _ = writer.await;
    Ok(())
}

async fn handle_request(
    state: &Arc<ServerState>,
    tx: &UnboundedSender<Vec<u8>>,
    session: &mut Session,
    conn_id: ConnectionId,
    player: PlayerId,
    request: Request,
) {
    let seq = request.seq;
    match request.intent {
        ClientIntent::CreateRoom { name } => {
            match state.engine.create_room(player, &name).await {
                Ok(room) => {
                    enter_room(state, tx, session, conn_id, &room, name);
                    queue(state, tx, &ServerMessage::ack_ok(seq, room.public_snapshot()));
                    broadcast_state(state, &room).await;
                }
                Err(e) => queue_err(state, tx, seq, &e),
            }
        }

        ClientIntent::JoinRoom { code, name } => {
            let code = RoomCode::normalized(&code);
            match state.engine.join_room(&code, player, &name).await {
                Ok(room) => {
                    enter_room(state, tx, session, conn_id, &room, name);
                    queue(state, tx, &ServerMessage::ack_ok(seq, room.public_snapshot()));
                    broadcast_state(state, &room).await;
                }
                Err(e) => queue_err(state, tx, seq, &e),
            }
        }

        ClientIntent::SetReady => {
            let Some(code) = session.room.clone() else {
                queue(state, tx, &ServerMessage::ack_err(seq, "not_in_room"));
                return;
            };
            match state.engine.set_ready(&code, player).await {
                Ok(room) => {
                    queue(state, tx, &ServerMessage::ack_ok(seq, room.public_snapshot()));
                    broadcast_state(state, &room).await;
                    if room.phase == Phase::Playing {
                        broadcast(
                            state,
                            &room.code,
                            &ServerMessage::GameStarted {
                                state: room.public_snapshot(),
                            },
                        )
                        .await;
                    }
                }
                Err(e) => queue_err(state, tx, seq, &e),
            }
        }

        ClientIntent::Roll
        | ClientIntent::Buy
        | ClientIntent::SkipBuy
        | ClientIntent::JailPay
        | ClientIntent::JailWait
        | ClientIntent::EndTurn => {
            let Some(code) = session.room.clone() else {
                queue(state, tx, &ServerMessage::ack_err(seq, "not_in_room"));
                return;
            };
            let result = match request.intent {
                ClientIntent::Roll => state.engine.roll_dice(&code, player).await,
                ClientIntent::Buy => state.engine.buy_property(&code, player).await,
                ClientIntent::SkipBuy => state.engine.skip_buy(&code, player).await,
                ClientIntent::JailPay => state.engine.jail_choice(&code, player, true).await,
                ClientIntent::JailWait => state.engine.jail_choice(&code, player, false).await,
                _ => state.engine.end_turn(&code, player).await,
            };
            match result {
                Ok(room) => {
                    queue(state, tx, &ServerMessage::ack_ok(seq, room.public_snapshot()));
                    broadcast_state(state, &room).await;
                    // The sweep inside the guards, or a bankruptcy this
                    // intent caused, may have just ended the game.
                    if room.phase == Phase::Finished {
                        broadcast(
                            state,
                            &room.code,
                            &ServerMessage::GameEnded {
                                winner_id: room.winner_id,
                                state: room.public_snapshot(),
                            },
                        )
                        .await;
                    }
                }
                Err(e) => queue_err(state, tx, seq, &e),
            }
        }

        ClientIntent::SyncState => {
            let Some(code) = session.room.clone() else {
                queue(state, tx, &ServerMessage::ack_err(seq, "not_in_room"));
                return;
            };
            match state.engine.load_room(&code).await {
                Ok(room) => queue(state, tx, &ServerMessage::ack_ok(seq, room.public_snapshot())),
                Err(e) => queue_err(state, tx, seq, &e),
            }
        }

        // Chat is fire-and-forget: no ack, the relayed broadcast is the
        // only response. Connections outside a room have nobody to talk
        // to, so the message is silently dropped.
        ClientIntent::Chat { text } => {
            let (Some(code), Some(name)) = (session.room.clone(), session.name.clone()) else {
                return;
            };
            broadcast(
                state,
                &code,
                &ServerMessage::Chat {
                    player_id: player,
                    name,
                    text: clamp_chat(&text),
                },
            )
            .await;
        }
    }
}

/// Records room membership on the session and in the local registry.
fn enter_room(
    state: &Arc<ServerState>,
    tx: &UnboundedSender<Vec<u8>>,
    session: &mut Session,
    conn_id: ConnectionId,
    room: &Room,
    name: String,
) {
    session.room = Some(room.code.clone());
    // Chat attribution uses the same trimmed, capped name the roster
    // shows, not the raw client string.
    session.name = Some(normalize_name(&name));
    state.registry.join(&room.code, conn_id, tx.clone());
}

/// Queues a message on this connection's outbound queue.
fn queue(state: &Arc<ServerState>, tx: &UnboundedSender<Vec<u8>>, msg: &ServerMessage) {
    match state.codec.encode(msg) {
        Ok(bytes) => {
            let _ = tx.send(bytes);
        }
        Err(e) => tracing::warn!(error = %e, "outbound encode failed"),
    }
}

fn queue_err(
    state: &Arc<ServerState>,
    tx: &UnboundedSender<Vec<u8>>,
    seq: u64,
    err: &EngineError,
) {
    queue(state, tx, &ServerMessage::ack_err(seq, error_code(err)));
}

async fn broadcast_state(state: &Arc<ServerState>, room: &Room) {
    broadcast(
        state,
        &room.code,
        &ServerMessage::RoomState {
            state: room.public_snapshot(),
        },
    )
    .await;
}

/// Sends a message to every local watcher of `code` and relays it to
/// other processes over the fan-out channel.
async fn broadcast(state: &Arc<ServerState>, code: &RoomCode, msg: &ServerMessage) {
    match state.codec.encode(msg) {
        Ok(bytes) => {
            state.registry.broadcast(code, &bytes);
            if let Some(fanout) = &state.fanout {
                fanout.publish(code, &bytes).await;
            }
        }
        Err(e) => tracing::warn!(error = %e, "broadcast encode failed"),
    }
}

/// Stable snake_case error code for acks.
fn error_code(err: &EngineError) -> String {
    match err {
        EngineError::NotFound(_) => "room_not_found".into(),
        EngineError::Game(game) => match serde_json::to_value(game) {
            Ok(serde_json::Value::String(code)) => code,
            _ => "rejected".into(),
        },
        EngineError::Store(_) => "store_unavailable".into(),
        EngineError::Corrupt(_) | EngineError::CodeAllocation => "internal_error".into(),
    }
}
