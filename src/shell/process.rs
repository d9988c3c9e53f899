//! Shell process wrapper.

use std::process::Stdio;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{oneshot, Mutex, OwnedMutexGuard};
use tracing::{debug, info, trace, warn};

use super::{DuplicateCache, ShellOptions};
use crate::error::{ExecutionError, ShellRelayError};
use crate::framing::{decode_output, FrameDecoder, Invocation};
use crate::Result;

/// Commands run once before the shell accepts caller commands.
///
/// Each line stands alone. `set` is a special builtin, and an invalid
/// option to it exits a POSIX shell, so it runs through `command`.
const INIT_COMMANDS: &str = "stty -echo 2>/dev/null\n\
export PS1='' PS2='' PROMPT_COMMAND=''\n\
command set +o histexpand 2>/dev/null\n\
unset HISTFILE\n";

type FrameResult = (std::io::Result<Vec<u8>>, OwnedMutexGuard<ShellIo>);

/// Holds the process lock on behalf of a fresh [`Execution`].
enum ShellLease {
    Held { _guard: OwnedMutexGuard<ShellIo> },
    /// The decode task still reads; it hands the guard over through the
    /// channel, where it stays until the receiver is dropped.
    Pending { _frame: oneshot::Receiver<FrameResult> },
}

/// Outcome of one `execute` call.
///
/// A fresh execution keeps the shell locked until it is dropped, so
/// whatever the caller records about it is ordered before the next
/// command on the same shell.
pub struct Execution {
    /// Combined stdout/stderr text, or the invocation error.
    pub outcome: std::result::Result<String, ExecutionError>,
    /// Whether the outcome was served from the duplicate-submission cache.
    pub cached: bool,
    lease: Option<ShellLease>,
}

impl Execution {
    fn fresh(outcome: std::result::Result<String, ExecutionError>, lease: ShellLease) -> Self {
        Self {
            outcome,
            cached: false,
            lease: Some(lease),
        }
    }

    fn cached(outcome: std::result::Result<String, ExecutionError>) -> Self {
        Self {
            outcome,
            cached: true,
            lease: None,
        }
    }

    /// Whether this execution still holds the shell.
    pub fn holds_shell(&self) -> bool {
        self.lease.is_some()
    }

    /// Let the next command run on the shell.
    pub fn release(&mut self) {
        self.lease = None;
    }

    /// The output text, if the command produced one.
    pub fn output(&self) -> Option<&str> {
        self.outcome.as_deref().ok()
    }

    /// Convert into the crate result type.
    pub fn into_result(self) -> Result<String> {
        self.outcome.map_err(ShellRelayError::from)
    }
}

impl std::fmt::Debug for Execution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Execution")
            .field("outcome", &self.outcome)
            .field("cached", &self.cached)
            .field("holds_shell", &self.holds_shell())
            .finish()
    }
}

/// Pipes guarded by the process-level lock.
struct ShellIo {
    stdin: ChildStdin,
    decoder: FrameDecoder<ChildStdout>,
}

/// One long-lived shell subprocess.
pub struct ShellProcess {
    label: String,
    pid: u32,
    options: ShellOptions,
    child: StdMutex<Child>,
    io: Arc<Mutex<ShellIo>>,
    cache: StdMutex<DuplicateCache>,
}

impl ShellProcess {
    /// Start a shell and run its initialization commands.
    ///
    /// `label` names the shell in log events, usually the session id.
    pub async fn spawn(label: impl Into<String>, options: ShellOptions) -> Result<Self> {
        let label = label.into();

        let mut cmd = Command::new(&options.program);
        cmd.args(&options.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env("TERM", "dumb")
            .env("NO_COLOR", "1")
            .env("PAGER", "cat")
            .env("GIT_PAGER", "cat")
            .env("PS1", "")
            .env("PS2", "")
            .kill_on_drop(true);

        if let Some(dir) = &options.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| {
            ShellRelayError::Spawn(format!("{}: {}", options.program.display(), e))
        })?;
        let pid = child.id().unwrap_or(0);

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ShellRelayError::Spawn("stdin was not captured".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ShellRelayError::Spawn("stdout was not captured".into()))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(drain_stderr(label.clone(), stderr));
        }

        let decoder = FrameDecoder::new(stdout).with_chunk_size(options.read_buffer_size);
        let shell = Self {
            cache: StdMutex::new(DuplicateCache::new(options.duplicate_cooldown)),
            label,
            pid,
            options,
            child: StdMutex::new(child),
            io: Arc::new(Mutex::new(ShellIo { stdin, decoder })),
        };

        shell.initialize().await?;
        info!(
            session = %shell.label,
            pid,
            program = %shell.options.program.display(),
            "shell started"
        );
        Ok(shell)
    }

    /// Silence prompts and echo, then wait for a framed no-op to round-trip.
    async fn initialize(&self) -> Result<()> {
        let mut io = self.io.lock().await;
        let probe = Invocation::new("true");

        let mut input = INIT_COMMANDS.to_string();
        input.push_str(&probe.encode());
        write_input(&mut io.stdin, &input)
            .await
            .map_err(|e| ShellRelayError::Spawn(format!("initialization failed: {}", e)))?;

        match tokio::time::timeout(
            self.options.startup_timeout,
            io.decoder.read_frame(probe.markers()),
        )
        .await
        {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(ShellRelayError::Spawn(format!(
                "shell exited during initialization: {}",
                e
            ))),
            Err(_) => Err(ShellRelayError::Spawn(format!(
                "shell did not answer within {:?}",
                self.options.startup_timeout
            ))),
        }
    }

    /// Name used in log events.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Process ID of the shell.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Options the shell was started with.
    pub fn options(&self) -> &ShellOptions {
        &self.options
    }

    /// Check whether the shell has exited, without blocking.
    pub fn has_exited(&self) -> Result<bool> {
        let mut child = self.child.lock().map_err(|_| ShellRelayError::LockPoisoned)?;
        match child.try_wait() {
            Ok(None) => Ok(false),
            Ok(Some(status)) => {
                debug!(session = %self.label, pid = self.pid, %status, "shell has exited");
                Ok(true)
            }
            Err(e) => {
                warn!(session = %self.label, pid = self.pid, "failed to poll shell: {}", e);
                Ok(true)
            }
        }
    }

    /// Run `command` in the shell and wait for its framed output.
    ///
    /// An identical command repeated within the cooldown is answered from
    /// the duplicate-submission cache without touching the shell. Otherwise
    /// the command waits for the process lock, is written to the shell, and
    /// its output is decoded by a background task raced against the
    /// command timeout. Every fresh outcome, including errors, replaces the
    /// cache entry. The next command on this shell waits until the returned
    /// execution is dropped or released.
    ///
    /// The outer `Result` only fails on internal errors; invocation
    /// failures are reported in [`Execution::outcome`].
    pub async fn execute(&self, command: &str) -> Result<Execution> {
        if let Some(outcome) = self.cached(command)? {
            debug!(session = %self.label, "duplicate submission answered from cache");
            return Ok(Execution::cached(outcome));
        }

        let io = Arc::clone(&self.io).lock_owned().await;

        // A retry that queued behind its original sees the original's result.
        if let Some(outcome) = self.cached(command)? {
            debug!(session = %self.label, "queued duplicate answered from cache");
            return Ok(Execution::cached(outcome));
        }

        let (outcome, lease) = self.run(io, command).await;
        self.cache
            .lock()
            .map_err(|_| ShellRelayError::LockPoisoned)?
            .record(command, &outcome);

        Ok(Execution::fresh(outcome, lease))
    }

    fn cached(&self, command: &str) -> Result<Option<std::result::Result<String, ExecutionError>>> {
        let cache = self.cache.lock().map_err(|_| ShellRelayError::LockPoisoned)?;
        Ok(cache.lookup(command))
    }

    async fn run(
        &self,
        mut io: OwnedMutexGuard<ShellIo>,
        command: &str,
    ) -> (std::result::Result<String, ExecutionError>, ShellLease) {
        let invocation = Invocation::new(command);
        let markers = invocation.markers().clone();
        debug!(session = %self.label, token = markers.token(), "submitting command");

        if let Err(e) = write_input(&mut io.stdin, &invocation.encode()).await {
            warn!(session = %self.label, pid = self.pid, "failed to write to shell: {}", e);
            return (
                Err(ExecutionError::WriteFailed(e.to_string())),
                ShellLease::Held { _guard: io },
            );
        }

        // The decode task owns the lock guard and sends it back with the
        // frame. It is released only once the frame completes or the
        // stream fails and nobody holds the receiver.
        let (tx, mut rx) = oneshot::channel::<FrameResult>();
        let label = self.label.clone();
        tokio::spawn(async move {
            let mut io = io;
            let result = io.decoder.read_frame(&markers).await;
            if tx.send((result, io)).is_err() {
                debug!(
                    session = %label,
                    token = markers.token(),
                    "late output of abandoned command discarded"
                );
            }
        });

        let timeout = self.options.command_timeout;
        match tokio::time::timeout(timeout, &mut rx).await {
            Ok(Ok((Ok(body), io))) => {
                debug!(
                    session = %self.label,
                    bytes = body.len(),
                    elapsed_ms = invocation.submitted_at().elapsed().as_millis() as u64,
                    "command completed"
                );
                (Ok(decode_output(&body)), ShellLease::Held { _guard: io })
            }
            Ok(Ok((Err(e), io))) => {
                warn!(session = %self.label, pid = self.pid, "failed to read shell output: {}", e);
                (
                    Err(ExecutionError::ReadFailed(e.to_string())),
                    ShellLease::Held { _guard: io },
                )
            }
            Ok(Err(_)) => (
                Err(ExecutionError::ReadFailed(
                    "output reader stopped without a result".into(),
                )),
                ShellLease::Pending { _frame: rx },
            ),
            Err(_) => {
                warn!(
                    session = %self.label,
                    timeout_secs = timeout.as_secs(),
                    "command timed out; shell left running"
                );
                (Err(ExecutionError::Timeout(timeout)), ShellLease::Pending { _frame: rx })
            }
        }
    }
}

impl std::fmt::Debug for ShellProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShellProcess")
            .field("label", &self.label)
            .field("pid", &self.pid)
            .field("program", &self.options.program)
            .finish()
    }
}

async fn write_input(stdin: &mut ChildStdin, input: &str) -> std::io::Result<()> {
    stdin.write_all(input.as_bytes()).await?;
    stdin.flush().await
}

/// Forward the shell's own stderr (prompts, job notices) to trace logs.
async fn drain_stderr(label: String, stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => trace!(session = %label, "shell stderr: {}", line),
            Ok(None) => break,
            Err(e) => {
                debug!(session = %label, "shell stderr closed: {}", e);
                break;
            }
        }
    }
}
