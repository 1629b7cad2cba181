//! Server builder and accept loop.

use std::sync::Arc;

use boardwalk_engine::RoomService;
use boardwalk_protocol::JsonCodec;
use boardwalk_store::{Fanout, Store};
use boardwalk_transport::{Transport, WebSocketTransport};
use tokio::sync::mpsc::unbounded_channel;

use crate::handler::handle_connection;
use crate::registry::RoomRegistry;
use crate::BoardwalkError;

/// Pub/sub channel shared by all server processes of one deployment.
const DEFAULT_FANOUT_CHANNEL: &str = "boardwalk:fanout";

/// Shared state handed to every connection task.
pub(crate) struct ServerState {
    pub(crate) engine: RoomService<Store>,
    pub(crate) registry: RoomRegistry,
    pub(crate) fanout: Option<Arc<Fanout>>,
    pub(crate) codec: JsonCodec,
}

/// Builder for a Boardwalk server.
///
/// ```rust,no_run
/// # async fn run() -> Result<(), boardwalk::BoardwalkError> {
/// let server = boardwalk::BoardwalkServer::builder()
///     .bind("0.0.0.0:8080")
///     .redis_url(std::env::var("REDIS_URL").ok())
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct BoardwalkServerBuilder {
    bind_addr: String,
    redis_url: Option<String>,
    fanout_channel: String,
}

impl BoardwalkServerBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            redis_url: None,
            fanout_channel: DEFAULT_FANOUT_CHANNEL.to_string(),
        }
    }

    /// Sets the address to listen on.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the Redis URL for durable rooms and cross-process fan-out.
    /// Without one (or with Redis down) the server runs standalone on
    /// an in-memory store.
    pub fn redis_url(mut self, url: Option<String>) -> Self {
        self.redis_url = url;
        self
    }

    /// Overrides the fan-out channel name.
    pub fn fanout_channel(mut self, channel: &str) -> Self {
        self.fanout_channel = channel.to_string();
        self
    }

    /// Binds the listener and connects the store.
    pub async fn build(self) -> Result<BoardwalkServer, BoardwalkError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        let store = Store::connect(self.redis_url.as_deref()).await;

        // Fan-out only makes sense when rooms are shared through Redis.
        let fanout = match (&self.redis_url, store.is_durable()) {
            (Some(url), true) => match Fanout::new(url, self.fanout_channel) {
                Ok(fanout) => Some(Arc::new(fanout)),
                Err(err) => {
                    tracing::warn!("fanout disabled: {err}");
                    None
                }
            },
            _ => None,
        };

        let state = Arc::new(ServerState {
            engine: RoomService::new(store),
            registry: RoomRegistry::new(),
            fanout,
            codec: JsonCodec,
        });

        Ok(BoardwalkServer { transport, state })
    }
}

impl Default for BoardwalkServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound server, ready to accept connections.
pub struct BoardwalkServer {
    transport: WebSocketTransport,
    state: Arc<ServerState>,
}

impl BoardwalkServer {
    pub fn builder() -> BoardwalkServerBuilder {
        BoardwalkServerBuilder::new()
    }

    /// The bound address, for tests that bind port 0.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, BoardwalkError> {
        Ok(self.transport.local_addr()?)
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(mut self) -> Result<(), BoardwalkError> {
        if let Some(fanout) = &self.state.fanout {
            let (tx, mut rx) = unbounded_channel();
            fanout.start(tx);
            let state = Arc::clone(&self.state);
            tokio::spawn(async move {
                while let Some(msg) = rx.recv().await {
                    state.registry.broadcast(&msg.room, &msg.payload);
                }
            });
        }

        tracing::info!("boardwalk server running");
        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Installs the global tracing subscriber, honoring `RUST_LOG`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
