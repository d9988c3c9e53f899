//! Error types for shell-relay.

use std::time::Duration;

use thiserror::Error;

/// Terminal outcome of a single command invocation that produced no output.
///
/// These are cloneable because the duplicate-submission cache replays
/// them verbatim to a retried request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// The framed command could not be written to the shell's input.
    #[error("failed to submit command: {0}")]
    WriteFailed(String),

    /// The shell's output stream closed or errored before the end marker.
    #[error("failed to read command output: {0}")]
    ReadFailed(String),

    /// No end marker was observed within the ceiling.
    #[error("command timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

/// Main error type for shell-relay operations.
#[derive(Error, Debug)]
pub enum ShellRelayError {
    /// Session has no backing state and may not be created implicitly.
    #[error("session not found: {0}")]
    SessionUnknown(String),

    /// Session identifier is empty or unsafe to use as a directory name.
    #[error("invalid session id: {0:?}")]
    InvalidSessionId(String),

    /// The shell process could not be started or initialized.
    #[error("failed to start shell: {0}")]
    Spawn(String),

    /// Command invocation failed.
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// Ticket storage failure.
    #[error("ticket storage error: {0}")]
    Ticket(String),

    /// Requested ticket does not exist.
    #[error("ticket {ticket} not found in session {session}")]
    TicketNotFound { session: String, ticket: u64 },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Ticket encoding or decoding error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Internal lock was poisoned.
    #[error("internal lock poisoned")]
    LockPoisoned,
}

impl From<serde_json::Error> for ShellRelayError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Convenience Result type for shell-relay operations.
pub type Result<T> = std::result::Result<T, ShellRelayError>;
