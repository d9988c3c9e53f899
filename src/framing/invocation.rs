//! Frame markers and command encoding.

use std::time::Instant;

use uuid::Uuid;

/// Prefix of the line printed before a command's output.
pub const START_PREFIX: &str = "START-";

/// Prefix of the line printed after a command's output.
pub const END_PREFIX: &str = "END-";

/// Shell variable that receives the exit status of the framed command.
///
/// The status is captured but not read back into responses.
pub const STATUS_VAR: &str = "__shell_relay_status";

/// A start/end marker pair unique to one invocation.
///
/// Tokens are random v4 UUIDs, so a command cannot predict and forge the
/// markers of a later invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    token: String,
    start: String,
    end: String,
}

impl Markers {
    /// Generate a fresh marker pair.
    pub fn generate() -> Self {
        Self::from_token(Uuid::new_v4().simple().to_string())
    }

    fn from_token(token: String) -> Self {
        Self {
            start: format!("{START_PREFIX}{token}"),
            end: format!("{END_PREFIX}{token}"),
            token,
        }
    }

    /// The random token shared by both markers.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// The start marker text.
    pub fn start(&self) -> &str {
        &self.start
    }

    /// The end marker text.
    pub fn end(&self) -> &str {
        &self.end
    }

    /// The full line the shell prints for the start marker.
    pub(crate) fn start_line(&self) -> Vec<u8> {
        let mut line = self.start.as_bytes().to_vec();
        line.push(b'\n');
        line
    }
}

/// One command submission to a persistent shell.
#[derive(Debug, Clone)]
pub struct Invocation {
    command: String,
    markers: Markers,
    submitted_at: Instant,
}

impl Invocation {
    /// Create an invocation with freshly generated markers.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            markers: Markers::generate(),
            submitted_at: Instant::now(),
        }
    }

    /// The raw command text.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Markers delimiting this invocation's output.
    pub fn markers(&self) -> &Markers {
        &self.markers
    }

    /// When the invocation was created.
    pub fn submitted_at(&self) -> Instant {
        self.submitted_at
    }

    /// Encode the framed shell input.
    ///
    /// Every piece sits on its own line so a trailing comment in the
    /// command cannot swallow the end marker. The brace group runs in the
    /// current shell, keeping `cd` and `export` effects, and merges the
    /// command's stderr into stdout.
    pub fn encode(&self) -> String {
        format!(
            "echo '{start}'\n{{ {command}\n}} 2>&1\n{STATUS_VAR}=$?\necho '{end}'\n",
            start = self.markers.start,
            command = self.command,
            end = self.markers.end,
        )
    }
}
