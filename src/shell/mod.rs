//! Persistent shell processes.
//!
//! A [`ShellProcess`] owns one long-lived interactive shell speaking over
//! plain pipes (no PTY). Commands are serialized through a process-level
//! lock, framed with unique markers, and decoded by a background task so
//! the caller can bound the wait with a timeout.
//!
//! # Cancellation
//!
//! A timed-out command is *not* killed. Killing the shell would throw away
//! the session's working directory, variables and jobs. The abandoned
//! decode task keeps the process lock until the command's end marker
//! shows up, so later commands on the same shell queue behind it, possibly
//! forever if the command never finishes.
//!
//! The shell's stdin carries the frames themselves. A command that reads
//! stdin (`cat`, `read x`) swallows the rest of its own frame, including
//! the end marker, and wedges the session the same way. Redirect such
//! commands from `/dev/null` or a file.

mod cache;
mod process;

pub use cache::{CachedResult, DuplicateCache};
pub use process::{Execution, ShellProcess};

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default ceiling for a single command.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// Default window in which an identical command is answered from cache.
pub const DEFAULT_DUPLICATE_COOLDOWN: Duration = Duration::from_secs(60);

/// Default time allowed for a new shell to answer its startup probe.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Get the default shell program.
///
/// Prefers bash and falls back to the POSIX shell.
pub fn default_shell() -> PathBuf {
    let bash = Path::new("/bin/bash");
    if bash.exists() {
        bash.to_path_buf()
    } else {
        PathBuf::from("/bin/sh")
    }
}

/// Options for spawning and driving a shell process.
#[derive(Debug, Clone)]
pub struct ShellOptions {
    /// Shell program to run.
    pub program: PathBuf,
    /// Arguments passed to the shell (the interactive flag).
    pub args: Vec<String>,
    /// Initial working directory.
    pub working_dir: Option<PathBuf>,
    /// Ceiling for a single command.
    pub command_timeout: Duration,
    /// Ceiling for the startup probe.
    pub startup_timeout: Duration,
    /// Duplicate-submission cooldown.
    pub duplicate_cooldown: Duration,
    /// Chunk size for reads from the shell's output.
    pub read_buffer_size: usize,
}

impl Default for ShellOptions {
    fn default() -> Self {
        Self {
            program: default_shell(),
            args: vec!["-i".to_string()],
            working_dir: None,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            duplicate_cooldown: DEFAULT_DUPLICATE_COOLDOWN,
            read_buffer_size: crate::framing::DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ShellOptions {
    /// Use a specific shell program.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Start the shell in a specific directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set the per-command ceiling.
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Set the duplicate-submission cooldown.
    pub fn with_duplicate_cooldown(mut self, cooldown: Duration) -> Self {
        self.duplicate_cooldown = cooldown;
        self
    }
}
