//! # shell-relay
//!
//! Persistent named shell sessions for remote command execution.
//!
//! Each session is one long-lived interactive shell, so working directory,
//! variables and background jobs survive between commands. Commands are
//! framed with random start/end markers to carve their output out of the
//! shell's continuous stream, serialized per session, bounded by a timeout
//! and guarded against accidental double execution by a one-slot cache.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use shell_relay::{MemoryTicketStore, SessionRegistry, ShellOptions, ShellRelay};
//!
//! #[tokio::main]
//! async fn main() -> shell_relay::Result<()> {
//!     shell_relay::logging::try_init(shell_relay::logging::DEFAULT_FILTER).ok();
//!
//!     let registry = SessionRegistry::new(ShellOptions::default());
//!     let relay = ShellRelay::new(registry, Arc::new(MemoryTicketStore::new()));
//!
//!     relay.execute("alpha", "cd /tmp").await?;
//!     let pwd = relay.execute("alpha", "pwd").await?;
//!     assert_eq!(pwd.output, "/tmp");
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod framing;
pub mod logging;
pub mod relay;
pub mod security;
pub mod session;
pub mod shell;
pub mod ticket;

// Re-export commonly used types
pub use error::{ExecutionError, Result, ShellRelayError};
pub use relay::{CommandOutput, ShellRelay};
pub use session::{Session, SessionId, SessionRegistry};
pub use shell::{Execution, ShellOptions, ShellProcess};
pub use ticket::{FsTicketStore, MemoryTicketStore, TicketRecord, TicketStore};
