//! Cross-process broadcast relay over Redis pub/sub.
//!
//! Every server process publishes the broadcasts it produces to one
//! shared channel, tagged with a per-process origin token, and
//! subscribes to the same channel. Messages whose origin matches our
//! own token are dropped, so a process never re-delivers its own
//! broadcasts; everything else is handed to the gateway to forward to
//! locally connected clients of that room.
//!
//! Delivery is best effort. A publish that fails is logged and dropped:
//! the room state is already durable in the store, and remote clients
//! converge on their next sync.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;

use boardwalk_game::RoomCode;

use crate::StoreError;

const RECONNECT_DELAY: Duration = Duration::from_secs(2);
const MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    origin: String,
    room: RoomCode,
    payload: Vec<u8>,
}

/// A broadcast that arrived from another process.
#[derive(Debug, Clone, PartialEq)]
pub struct FanoutMessage {
    pub room: RoomCode,
    pub payload: Vec<u8>,
}

/// Pub/sub relay handle. One per process.
pub struct Fanout {
    origin: String,
    channel: String,
    client: redis::Client,
    publisher: Mutex<Option<redis::aio::ConnectionManager>>,
}

impl Fanout {
    pub fn new(url: &str, channel: String) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        Ok(Self {
            origin: origin_token(),
            channel,
            client,
            publisher: Mutex::new(None),
        })
    }

    /// This process's origin tag, as attached to published messages.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Spawns the subscriber task. Incoming messages from *other*
    /// processes are pushed into `incoming`; the task reconnects with a
    /// delay after any pub/sub failure and stops when the receiver side
    /// of `incoming` is dropped.
    pub fn start(self: &Arc<Self>, incoming: UnboundedSender<FanoutMessage>) {
        let fanout = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match fanout.run_subscriber(&incoming).await {
                    Ok(Stop::ReceiverGone) => break,
                    Ok(Stop::StreamEnded) => {
                        tracing::warn!("fanout pubsub stream ended, reconnecting");
                        tokio::time::sleep(RECONNECT_DELAY).await;
                    }
                    Err(err) => {
                        tracing::warn!("fanout subscriber error: {err}");
                        tokio::time::sleep(RECONNECT_DELAY).await;
                    }
                }
            }
        });
    }

    /// Publishes a room broadcast to the other processes.
    pub async fn publish(&self, room: &RoomCode, payload: &[u8]) {
        if payload.len() > MAX_PAYLOAD_BYTES {
            tracing::warn!(len = payload.len(), "skipping fanout publish: payload too large");
            return;
        }
        let envelope = Envelope {
            origin: self.origin.clone(),
            room: room.clone(),
            payload: payload.to_vec(),
        };
        let bytes = match serde_json::to_vec(&envelope) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!("fanout envelope encode failed: {err}");
                return;
            }
        };
        let mut guard = match self.ensure_publisher().await {
            Ok(guard) => guard,
            Err(err) => {
                tracing::warn!("fanout publisher connection failed: {err}");
                return;
            }
        };
        let Some(conn) = guard.as_mut() else {
            return;
        };
        let result: redis::RedisResult<()> = redis::cmd("PUBLISH")
            .arg(&self.channel)
            .arg(bytes)
            .query_async(conn)
            .await;
        if let Err(err) = result {
            tracing::warn!("fanout publish failed: {err}");
            *guard = None;
        }
    }

    async fn ensure_publisher(
        &self,
    ) -> Result<tokio::sync::MutexGuard<'_, Option<redis::aio::ConnectionManager>>, StoreError>
    {
        let mut guard = self.publisher.lock().await;
        if guard.is_none() {
            *guard = Some(self.client.get_connection_manager().await?);
        }
        Ok(guard)
    }

    async fn run_subscriber(
        &self,
        incoming: &UnboundedSender<FanoutMessage>,
    ) -> Result<Stop, StoreError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(&self.channel).await?;
        let mut stream = pubsub.on_message();
        while let Some(message) = stream.next().await {
            let payload: Vec<u8> = match message.get_payload() {
                Ok(payload) => payload,
                Err(err) => {
                    tracing::warn!("fanout message payload read failed: {err}");
                    continue;
                }
            };
            let envelope: Envelope = match serde_json::from_slice(&payload) {
                Ok(envelope) => envelope,
                Err(err) => {
                    tracing::warn!("fanout envelope decode failed: {err}");
                    continue;
                }
            };
            if envelope.origin == self.origin {
                continue;
            }
            let forwarded = incoming.send(FanoutMessage {
                room: envelope.room,
                payload: envelope.payload,
            });
            if forwarded.is_err() {
                return Ok(Stop::ReceiverGone);
            }
        }
        Ok(Stop::StreamEnded)
    }
}

/// Why a subscriber pass returned without error.
enum Stop {
    /// The server dropped its receiver; stop for good.
    ReceiverGone,
    /// The pub/sub stream dried up (connection lost); reconnect.
    StreamEnded,
}

/// 128-bit random hex tag identifying this process on the channel.
fn origin_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
