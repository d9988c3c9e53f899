//! Session registry.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tokio::sync::OnceCell;
use tracing::{info, warn};

use super::SessionId;
use crate::error::ShellRelayError;
use crate::shell::{ShellOptions, ShellProcess};
use crate::Result;

/// A named, persistent shell.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    shell: ShellProcess,
    created_at: Instant,
}

impl Session {
    /// Start the shell backing session `id`.
    pub async fn start(id: SessionId, options: ShellOptions) -> Result<Self> {
        let shell = ShellProcess::spawn(id.as_str(), options).await?;
        Ok(Self {
            id,
            shell,
            created_at: Instant::now(),
        })
    }

    /// Session identifier.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// The backing shell process.
    pub fn shell(&self) -> &ShellProcess {
        &self.shell
    }

    /// Time since the shell was started.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

type Slot = Arc<OnceCell<Arc<Session>>>;

/// Maps session identifiers to live sessions, creating them on first use.
///
/// Each identifier owns a once-cell, so concurrent first users of one
/// identifier start exactly one shell while different identifiers are
/// created in parallel. The map lock is only held to look up or insert a
/// cell, never across shell startup.
pub struct SessionRegistry {
    slots: RwLock<HashMap<SessionId, Slot>>,
    options: ShellOptions,
}

impl SessionRegistry {
    /// Create an empty registry whose shells use `options`.
    pub fn new(options: ShellOptions) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            options,
        }
    }

    /// Options used for new shells.
    pub fn options(&self) -> &ShellOptions {
        &self.options
    }

    /// Get the live session for `id`, starting its shell if needed.
    ///
    /// A session whose shell has exited is replaced by a fresh one. A live
    /// shell is never replaced.
    pub async fn get_or_create(&self, id: &SessionId) -> Result<Arc<Session>> {
        let session = self.resolve(id).await?;
        if !session.shell().has_exited()? {
            return Ok(session);
        }

        warn!(
            session = %id,
            pid = session.shell().pid(),
            "shell has exited, starting a replacement"
        );
        self.evict(id, &session)?;
        self.resolve(id).await
    }

    async fn resolve(&self, id: &SessionId) -> Result<Arc<Session>> {
        let slot = self.slot(id)?;
        let session = slot
            .get_or_try_init(|| async {
                let session = Session::start(id.clone(), self.options.clone()).await?;
                info!(session = %id, pid = session.shell().pid(), "session created");
                Ok::<_, ShellRelayError>(Arc::new(session))
            })
            .await?;
        Ok(Arc::clone(session))
    }

    fn slot(&self, id: &SessionId) -> Result<Slot> {
        {
            let slots = self.slots.read().map_err(|_| ShellRelayError::LockPoisoned)?;
            if let Some(slot) = slots.get(id) {
                return Ok(Arc::clone(slot));
            }
        }

        let mut slots = self.slots.write().map_err(|_| ShellRelayError::LockPoisoned)?;
        Ok(Arc::clone(slots.entry(id.clone()).or_default()))
    }

    /// Drop the slot for `id` if it still holds `stale`.
    fn evict(&self, id: &SessionId, stale: &Arc<Session>) -> Result<()> {
        let mut slots = self.slots.write().map_err(|_| ShellRelayError::LockPoisoned)?;
        let holds_stale = slots
            .get(id)
            .and_then(|slot| slot.get())
            .is_some_and(|current| Arc::ptr_eq(current, stale));
        if holds_stale {
            slots.remove(id);
        }
        Ok(())
    }

    /// Get the session for `id` if its shell has been started.
    pub fn get(&self, id: &SessionId) -> Result<Option<Arc<Session>>> {
        let slots = self.slots.read().map_err(|_| ShellRelayError::LockPoisoned)?;
        Ok(slots.get(id).and_then(|slot| slot.get()).cloned())
    }

    /// Number of started sessions.
    pub fn len(&self) -> usize {
        self.slots
            .read()
            .map(|slots| slots.values().filter(|slot| slot.initialized()).count())
            .unwrap_or(0)
    }

    /// Check whether no session has been started.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identifiers of started sessions, sorted.
    pub fn ids(&self) -> Result<Vec<SessionId>> {
        let slots = self.slots.read().map_err(|_| ShellRelayError::LockPoisoned)?;
        let mut ids: Vec<_> = slots
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.len())
            .field("program", &self.options.program)
            .finish()
    }
}
