//! In-memory ticket store.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use super::{TicketRecord, TicketStore};
use crate::error::ShellRelayError;
use crate::session::SessionId;
use crate::Result;

/// Keeps tickets in process memory. Useful for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryTicketStore {
    sessions: RwLock<HashMap<SessionId, BTreeMap<u64, TicketRecord>>>,
}

impl MemoryTicketStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored tickets across all sessions.
    pub fn ticket_count(&self) -> usize {
        self.sessions
            .read()
            .map(|sessions| sessions.values().map(BTreeMap::len).sum())
            .unwrap_or(0)
    }
}

fn unknown(session: &SessionId) -> ShellRelayError {
    ShellRelayError::SessionUnknown(session.to_string())
}

impl TicketStore for MemoryTicketStore {
    fn session_exists(&self, session: &SessionId) -> Result<bool> {
        let sessions = self.sessions.read().map_err(|_| ShellRelayError::LockPoisoned)?;
        Ok(sessions.contains_key(session))
    }

    fn ensure_session(&self, session: &SessionId) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(|_| ShellRelayError::LockPoisoned)?;
        sessions.entry(session.clone()).or_default();
        Ok(())
    }

    fn next_ticket(&self, session: &SessionId) -> Result<u64> {
        let sessions = self.sessions.read().map_err(|_| ShellRelayError::LockPoisoned)?;
        let tickets = sessions.get(session).ok_or_else(|| unknown(session))?;
        Ok(tickets.keys().next_back().map_or(1, |last| last + 1))
    }

    fn persist(&self, session: &SessionId, record: &TicketRecord) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(|_| ShellRelayError::LockPoisoned)?;
        let tickets = sessions.get_mut(session).ok_or_else(|| unknown(session))?;
        if tickets.contains_key(&record.ticket) {
            return Err(ShellRelayError::Ticket(format!(
                "ticket {} already exists in session {}",
                record.ticket, session
            )));
        }
        tickets.insert(record.ticket, record.clone());
        Ok(())
    }

    fn load(&self, session: &SessionId, ticket: u64) -> Result<TicketRecord> {
        let sessions = self.sessions.read().map_err(|_| ShellRelayError::LockPoisoned)?;
        let tickets = sessions.get(session).ok_or_else(|| unknown(session))?;
        tickets
            .get(&ticket)
            .cloned()
            .ok_or_else(|| ShellRelayError::TicketNotFound {
                session: session.to_string(),
                ticket,
            })
    }

    fn history(&self, session: &SessionId) -> Result<Vec<TicketRecord>> {
        let sessions = self.sessions.read().map_err(|_| ShellRelayError::LockPoisoned)?;
        let tickets = sessions.get(session).ok_or_else(|| unknown(session))?;
        Ok(tickets.values().cloned().collect())
    }
}
