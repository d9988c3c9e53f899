//! Caller-facing command relay.
//!
//! [`ShellRelay::execute`] is the single entry point for running a command:
//! it resolves the session, runs the command through the session's shell
//! (or answers it from the duplicate-submission cache) and records a
//! ticket for every fresh invocation.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{ExecutionError, ShellRelayError};
use crate::session::{SessionId, SessionRegistry};
use crate::ticket::{TicketRecord, TicketStore};
use crate::Result;

/// Successful result of [`ShellRelay::execute`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandOutput {
    /// Ticket recorded for this invocation; absent when served from cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket: Option<u64>,
    /// Session the command ran in.
    pub session: String,
    /// Command text as submitted.
    pub input: String,
    /// Combined stdout/stderr with trailing newlines trimmed.
    pub output: String,
    /// Whether the output came from the duplicate-submission cache.
    pub cached: bool,
}

/// Runs commands in named persistent shells and keeps their tickets.
pub struct ShellRelay {
    registry: SessionRegistry,
    tickets: Arc<dyn TicketStore>,
    auto_create: bool,
}

impl ShellRelay {
    /// Create a relay that creates unknown sessions on first use.
    pub fn new(registry: SessionRegistry, tickets: Arc<dyn TicketStore>) -> Self {
        Self {
            registry,
            tickets,
            auto_create: true,
        }
    }

    /// Choose whether a session without backing state is created implicitly.
    pub fn with_auto_create(mut self, auto_create: bool) -> Self {
        self.auto_create = auto_create;
        self
    }

    /// The session registry.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// The ticket store.
    pub fn tickets(&self) -> &Arc<dyn TicketStore> {
        &self.tickets
    }

    /// Run `command` in session `session`.
    ///
    /// Fresh invocations get the next ticket number, and their outcome
    /// (including failures) is persisted before this returns. A duplicate
    /// answered from cache returns the original outcome with no ticket.
    pub async fn execute(&self, session: &str, command: &str) -> Result<CommandOutput> {
        let id = SessionId::new(session)?;
        self.prepare(&id).await?;

        let session = self.registry.get_or_create(&id).await?;
        let execution = session.shell().execute(command).await?;

        // A fresh execution keeps the shell locked, so tickets follow the
        // order in which commands ran.
        let ticket = if execution.cached {
            None
        } else {
            Some(self.record(&id, command, &execution.outcome).await?)
        };

        debug!(
            session = %id,
            ticket,
            cached = execution.cached,
            ok = execution.outcome.is_ok(),
            "command relayed"
        );

        let output = execution.outcome?;
        Ok(CommandOutput {
            ticket,
            session: id.to_string(),
            input: command.to_string(),
            output,
            cached: execution.cached,
        })
    }

    /// Load a stored ticket.
    pub async fn ticket(&self, session: &str, ticket: u64) -> Result<TicketRecord> {
        let id = SessionId::new(session)?;
        self.blocking(move |store| store.load(&id, ticket)).await
    }

    /// All stored tickets of a session, ordered by number.
    pub async fn history(&self, session: &str) -> Result<Vec<TicketRecord>> {
        let id = SessionId::new(session)?;
        self.blocking(move |store| store.history(&id)).await
    }

    async fn prepare(&self, id: &SessionId) -> Result<()> {
        let id = id.clone();
        let auto_create = self.auto_create;
        self.blocking(move |store| {
            if store.session_exists(&id)? {
                Ok(())
            } else if auto_create {
                store.ensure_session(&id)
            } else {
                Err(ShellRelayError::SessionUnknown(id.to_string()))
            }
        })
        .await
    }

    /// Number and persist a fresh outcome while its execution holds the shell.
    async fn record(
        &self,
        id: &SessionId,
        command: &str,
        outcome: &std::result::Result<String, ExecutionError>,
    ) -> Result<u64> {
        let id = id.clone();
        let command = command.to_string();
        let outcome = outcome.clone();
        let result = self
            .blocking(move |store| {
                let ticket = store.next_ticket(&id)?;
                store.persist(&id, &TicketRecord::new(ticket, &id, command, &outcome))?;
                Ok(ticket)
            })
            .await;

        if let Err(e) = &result {
            warn!("failed to record ticket: {}", e);
        }
        result
    }

    /// Run a ticket store operation on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn TicketStore) -> Result<T> + Send + 'static,
    {
        let store = Arc::clone(&self.tickets);
        tokio::task::spawn_blocking(move || f(store.as_ref()))
            .await
            .map_err(|e| ShellRelayError::Ticket(format!("ticket task failed: {}", e)))?
    }
}

impl std::fmt::Debug for ShellRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShellRelay")
            .field("registry", &self.registry)
            .field("auto_create", &self.auto_create)
            .finish()
    }
}
