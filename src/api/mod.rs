//! HTTP layer for shell-relay.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check, never requires the secret
//! - `GET /shell?session=&cmd=` - Run a command in a named session
//! - `GET /status?session=&ticket=` - Fetch one stored ticket
//! - `GET /history?session=` - List a session's tickets
//!
//! When a shared secret is configured, every route but `/health` also
//! needs `hash=<secret>`.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use shell_relay::api::{serve, AppState, ServerConfig};
//! use shell_relay::security::HashAuth;
//! use shell_relay::{MemoryTicketStore, SessionRegistry, ShellOptions, ShellRelay};
//!
//! #[tokio::main]
//! async fn main() -> shell_relay::Result<()> {
//!     let registry = SessionRegistry::new(ShellOptions::default());
//!     let relay = ShellRelay::new(registry, Arc::new(MemoryTicketStore::new()));
//!     let state = AppState::new(relay, HashAuth::disabled());
//!     serve(ServerConfig::new("127.0.0.1", 3000), state).await
//! }
//! ```

pub mod handlers;
pub mod router;
pub mod types;

pub use handlers::{error_response, AppState};
pub use router::{create_router, serve, ServerConfig};
pub use types::{ErrorResponse, HistoryQuery, ShellQuery, StatusQuery};
