//! API request and response types.

use serde::{Deserialize, Serialize};

/// Query of `GET /shell`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShellQuery {
    /// Target session.
    #[serde(default)]
    pub session: Option<String>,
    /// Command line to run.
    #[serde(default)]
    pub cmd: Option<String>,
}

/// Query of `GET /status`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    pub session: Option<String>,
    /// Ticket number; kept as text so a malformed value gets a JSON error.
    #[serde(default)]
    pub ticket: Option<String>,
}

impl StatusQuery {
    /// Parse the ticket number.
    pub fn ticket_number(&self) -> Option<u64> {
        self.ticket.as_deref()?.trim().parse().ok()
    }
}

/// Query of `GET /history`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub session: Option<String>,
}

/// Generic API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "SESSION_NOT_FOUND").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn session_not_found(id: &str) -> Self {
        Self::new("SESSION_NOT_FOUND", format!("Session '{}' not found", id))
    }

    pub fn ticket_not_found(message: impl Into<String>) -> Self {
        Self::new("TICKET_NOT_FOUND", message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new("TIMEOUT", message)
    }

    pub fn execution_failed(message: impl Into<String>) -> Self {
        Self::new("EXECUTION_FAILED", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}
