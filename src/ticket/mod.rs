//! Ticket persistence.
//!
//! Every fresh command run through the relay is recorded as a numbered
//! ticket in its session. Numbers start at 1 and increase by one per
//! session; duplicate submissions answered from cache get no ticket.

mod fs;
mod memory;

pub use fs::FsTicketStore;
pub use memory::MemoryTicketStore;

use serde::{Deserialize, Serialize};

use crate::error::ExecutionError;
use crate::session::SessionId;
use crate::Result;

/// Stored record of one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRecord {
    /// Per-session sequence number.
    pub ticket: u64,
    /// Owning session.
    pub session: String,
    /// Command text as submitted.
    pub input: String,
    /// Captured output, empty when the command failed.
    pub output: String,
    /// Invocation error, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether the output came from the duplicate-submission cache.
    #[serde(default)]
    pub cached: bool,
}

impl TicketRecord {
    /// Build the record for a fresh invocation outcome.
    pub fn new(
        ticket: u64,
        session: &SessionId,
        input: impl Into<String>,
        outcome: &std::result::Result<String, ExecutionError>,
    ) -> Self {
        let (output, error) = match outcome {
            Ok(output) => (output.clone(), None),
            Err(e) => (String::new(), Some(e.to_string())),
        };
        Self {
            ticket,
            session: session.to_string(),
            input: input.into(),
            output,
            error,
            cached: false,
        }
    }
}

/// Backing storage for ticket records.
///
/// Implementations are synchronous; async callers run them on the
/// blocking pool.
pub trait TicketStore: Send + Sync {
    /// Check whether `session` has backing state.
    fn session_exists(&self, session: &SessionId) -> Result<bool>;

    /// Create backing state for `session` if it has none.
    fn ensure_session(&self, session: &SessionId) -> Result<()>;

    /// Next ticket number: one more than the highest stored, or 1.
    fn next_ticket(&self, session: &SessionId) -> Result<u64>;

    /// Store `record` under its session and number.
    fn persist(&self, session: &SessionId, record: &TicketRecord) -> Result<()>;

    /// Load one ticket.
    fn load(&self, session: &SessionId, ticket: u64) -> Result<TicketRecord>;

    /// All tickets of `session`, ordered by number.
    fn history(&self, session: &SessionId) -> Result<Vec<TicketRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn session() -> SessionId {
        SessionId::new("alpha").unwrap()
    }

    #[test]
    fn test_record_from_output() {
        let record = TicketRecord::new(3, &session(), "echo hi", &Ok("hi".into()));
        assert_eq!(record.ticket, 3);
        assert_eq!(record.session, "alpha");
        assert_eq!(record.output, "hi");
        assert!(record.error.is_none());
        assert!(!record.cached);
    }

    #[test]
    fn test_record_from_error() {
        let outcome = Err(ExecutionError::Timeout(Duration::from_secs(5)));
        let record = TicketRecord::new(1, &session(), "sleep 99", &outcome);
        assert!(record.output.is_empty());
        assert_eq!(record.error.as_deref(), Some("command timed out after 5s"));
    }

    #[test]
    fn test_json_shape() {
        let record = TicketRecord::new(1, &session(), "pwd", &Ok("/tmp".into()));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "ticket": 1,
                "session": "alpha",
                "input": "pwd",
                "output": "/tmp",
                "cached": false
            })
        );
    }

    #[test]
    fn test_reads_records_without_optional_fields() {
        let json = r#"{"ticket":2,"session":"alpha","input":"ls","output":"a"}"#;
        let record: TicketRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.ticket, 2);
        assert!(record.error.is_none());
        assert!(!record.cached);
    }
}
