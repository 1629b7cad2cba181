//! # Boardwalk
//!
//! Server-authoritative multiplayer property-trading game over
//! WebSockets. Clients send intents; the server validates them against
//! the rules in `boardwalk-game`, persists every accepted transition
//! through `boardwalk-engine` and `boardwalk-store`, and broadcasts the
//! resulting room snapshot to all connected players.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! # async fn run() -> Result<(), boardwalk::BoardwalkError> {
//! boardwalk::init_tracing();
//! let server = boardwalk::BoardwalkServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .redis_url(std::env::var("REDIS_URL").ok())
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod registry;
mod server;

pub use error::BoardwalkError;
pub use server::{init_tracing, BoardwalkServer, BoardwalkServerBuilder};
