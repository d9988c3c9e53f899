//! Directory-backed ticket store.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::{TicketRecord, TicketStore};
use crate::error::ShellRelayError;
use crate::session::SessionId;
use crate::Result;

const TICKET_EXT: &str = "ticket";

/// Stores tickets as `<root>/<session>/<NN>.ticket` JSON files.
#[derive(Debug, Clone)]
pub struct FsTicketStore {
    root: PathBuf,
}

impl FsTicketStore {
    /// Use `root` as the sessions directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Use `root`, creating it if missing.
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(root);
        fs::create_dir_all(&store.root)?;
        Ok(store)
    }

    /// The sessions directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn session_dir(&self, session: &SessionId) -> PathBuf {
        self.root.join(session.as_str())
    }

    fn ticket_path(&self, session: &SessionId, ticket: u64) -> PathBuf {
        self.session_dir(session)
            .join(format!("{:02}.{}", ticket, TICKET_EXT))
    }

    fn ticket_numbers(&self, session: &SessionId) -> Result<Vec<(u64, PathBuf)>> {
        let dir = self.session_dir(session);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ShellRelayError::SessionUnknown(session.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let mut numbers = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if let Some(number) = ticket_number(&path) {
                numbers.push((number, path));
            }
        }
        numbers.sort_by_key(|(number, _)| *number);
        Ok(numbers)
    }
}

/// Parse the number out of an `NN.ticket` file name.
fn ticket_number(path: &Path) -> Option<u64> {
    if path.extension()?.to_str()? != TICKET_EXT {
        return None;
    }
    path.file_stem()?.to_str()?.parse().ok()
}

impl TicketStore for FsTicketStore {
    fn session_exists(&self, session: &SessionId) -> Result<bool> {
        Ok(self.session_dir(session).is_dir())
    }

    fn ensure_session(&self, session: &SessionId) -> Result<()> {
        fs::create_dir_all(self.session_dir(session))?;
        Ok(())
    }

    fn next_ticket(&self, session: &SessionId) -> Result<u64> {
        let last = self
            .ticket_numbers(session)?
            .last()
            .map(|(number, _)| *number)
            .unwrap_or(0);
        Ok(last + 1)
    }

    fn persist(&self, session: &SessionId, record: &TicketRecord) -> Result<()> {
        let path = self.ticket_path(session, record.ticket);
        let body = serde_json::to_vec(record)?;

        // Tickets are immutable once written.
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| ShellRelayError::Ticket(format!("{}: {}", path.display(), e)))?;
        file.write_all(&body)
            .map_err(|e| ShellRelayError::Ticket(format!("{}: {}", path.display(), e)))?;

        debug!(session = %session, ticket = record.ticket, "ticket written");
        Ok(())
    }

    fn load(&self, session: &SessionId, ticket: u64) -> Result<TicketRecord> {
        if !self.session_exists(session)? {
            return Err(ShellRelayError::SessionUnknown(session.to_string()));
        }

        let body = match fs::read(self.ticket_path(session, ticket)) {
            Ok(body) => body,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ShellRelayError::TicketNotFound {
                    session: session.to_string(),
                    ticket,
                })
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&body)?)
    }

    fn history(&self, session: &SessionId) -> Result<Vec<TicketRecord>> {
        let mut records = Vec::new();
        for (number, path) in self.ticket_numbers(session)? {
            let parsed = fs::read(&path)
                .map_err(ShellRelayError::from)
                .and_then(|body| {
                    serde_json::from_slice::<TicketRecord>(&body).map_err(ShellRelayError::from)
                });
            match parsed {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(session = %session, ticket = number, "skipping unreadable ticket: {}", e)
                }
            }
        }
        Ok(records)
    }
}
