//! Configuration management for shell-relay.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. `.env` file in the working directory
//! 4. Configuration file (JSON)
//! 5. Default values

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::api::ServerConfig;
use crate::cli::Args;
use crate::security::MIN_HASH_LEN;
use crate::shell::{default_shell, ShellOptions};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerSection,
    /// Security configuration.
    pub security: SecuritySection,
    /// Shell process configuration.
    pub shell: ShellSection,
    /// Ticket storage configuration.
    pub sessions: SessionsSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Security configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySection {
    /// Shared secret; `None` disables the check.
    pub hash: Option<String>,
}

/// Shell process configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellSection {
    /// Shell program; bash when present, else sh.
    pub program: Option<PathBuf>,
    /// Working directory for new shells.
    pub working_dir: Option<PathBuf>,
    /// Per-command timeout in seconds.
    pub command_timeout_secs: u64,
    /// Duplicate-submission cooldown in seconds.
    pub duplicate_cooldown_secs: u64,
    /// Chunk size for output reads.
    pub read_buffer_size: usize,
}

impl Default for ShellSection {
    fn default() -> Self {
        let options = ShellOptions::default();
        Self {
            program: None,
            working_dir: None,
            command_timeout_secs: options.command_timeout.as_secs(),
            duplicate_cooldown_secs: options.duplicate_cooldown.as_secs(),
            read_buffer_size: options.read_buffer_size,
        }
    }
}

/// Ticket storage configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsSection {
    /// Directory holding one folder of tickets per session.
    pub dir: PathBuf,
    /// Create unknown sessions on first use.
    pub auto_create: bool,
}

impl Default for SessionsSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("sessions"),
            auto_create: true,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace) or a full filter.
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(host) = var("SHELL_RELAY_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("SHELL_RELAY_PORT") {
            self.server.port = parse_env("SHELL_RELAY_PORT", port)?;
        }
        if let Some(hash) = var("SHELL_RELAY_HASH") {
            self.security.hash = Some(hash);
        }
        if let Some(shell) = var("SHELL_RELAY_SHELL") {
            self.shell.program = Some(PathBuf::from(shell));
        }
        if let Some(dir) = var("SHELL_RELAY_SESSIONS_DIR") {
            self.sessions.dir = PathBuf::from(dir);
        }
        if let Some(secs) = var("SHELL_RELAY_TIMEOUT_SECS") {
            self.shell.command_timeout_secs = parse_env("SHELL_RELAY_TIMEOUT_SECS", secs)?;
        }
        if let Some(level) = var("SHELL_RELAY_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Some(level) = var("RUST_LOG") {
            self.logging.level = level;
        }
        Ok(())
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(host) = args.host {
            self.server.host = host.to_string();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(ref hash) = args.hash {
            self.security.hash = Some(hash.clone());
        }
        if args.no_auth {
            self.security.hash = None;
        }
        if let Some(ref dir) = args.sessions_dir {
            self.sessions.dir = dir.clone();
        }
        if let Some(ref shell) = args.shell {
            self.shell.program = Some(shell.clone());
        }
        if let Some(secs) = args.timeout_secs {
            self.shell.command_timeout_secs = secs;
        }
        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain and validate it.
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match args.config {
            Some(ref path) => Config::from_file(path)?,
            None => Config::default(),
        };

        // Variables already set in the environment win over .env entries.
        dotenvy::dotenv().ok();
        config.apply_env()?;
        config.apply_args(args);

        config.validate()?;
        Ok(config)
    }

    /// Check values that would only fail later at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.host()?;
        if let Some(ref hash) = self.security.hash {
            if hash.chars().count() < MIN_HASH_LEN {
                return Err(ConfigError::InvalidHash);
            }
        }
        if self.shell.command_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "shell.command_timeout_secs",
                "0".to_string(),
            ));
        }
        Ok(())
    }

    fn host(&self) -> Result<IpAddr, ConfigError> {
        self.server
            .host
            .parse()
            .map_err(|_| ConfigError::InvalidHost(self.server.host.clone()))
    }

    /// Convert to ServerConfig for the API server.
    pub fn to_server_config(&self) -> Result<ServerConfig, ConfigError> {
        let host = self.host()?;
        Ok(ServerConfig::new(host.to_string(), self.server.port))
    }

    /// Options for every session's shell.
    pub fn to_shell_options(&self) -> ShellOptions {
        let mut options = ShellOptions::default()
            .with_program(self.shell.program.clone().unwrap_or_else(default_shell))
            .with_command_timeout(Duration::from_secs(self.shell.command_timeout_secs))
            .with_duplicate_cooldown(Duration::from_secs(self.shell.duplicate_cooldown_secs));
        if let Some(ref dir) = self.shell.working_dir {
            options = options.with_working_dir(dir);
        }
        options.read_buffer_size = self.shell.read_buffer_size.max(1);
        options
    }

    /// Get the log filter string.
    ///
    /// A bare level applies to this crate and the HTTP trace layer; anything
    /// else is used as a full filter directive.
    pub fn log_filter(&self) -> String {
        let level = self.logging.level.trim();
        if level.contains('=') || level.contains(',') {
            level.to_string()
        } else {
            format!("shell_relay={level},tower_http={level}")
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(name, value))
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// Invalid host address.
    InvalidHost(String),
    /// Shared secret shorter than the minimum.
    InvalidHash,
    /// A setting that does not parse or is out of range.
    InvalidValue(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidHost(host) => write!(f, "invalid host address: {}", host),
            Self::InvalidHash => write!(
                f,
                "hash must be at least {} characters long",
                MIN_HASH_LEN
            ),
            Self::InvalidValue(name, value) => write!(f, "invalid value for {}: '{}'", name, value),
        }
    }
}

impl std::error::Error for ConfigError {}
