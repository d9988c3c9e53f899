//! Command-line interface for shell-relay.

use std::ffi::OsString;
use std::net::IpAddr;
use std::path::PathBuf;

/// Command-line arguments.
///
/// Every setting is optional; an absent flag leaves the value from the
/// environment, config file or defaults untouched.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Host address to bind to.
    pub host: Option<IpAddr>,
    /// Port to listen on.
    pub port: Option<u16>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Shared secret required in the `hash` query parameter.
    pub hash: Option<String>,
    /// Disable the shared-secret check.
    pub no_auth: bool,
    /// Directory holding per-session ticket folders.
    pub sessions_dir: Option<PathBuf>,
    /// Shell program to run for each session.
    pub shell: Option<PathBuf>,
    /// Per-command timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator whose first item is the program name.
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => result.help = true,
            Short('V') | Long("version") => result.version = true,
            Short('H') | Long("host") => {
                let value: String = parser.value()?.parse()?;
                let host = value
                    .parse::<IpAddr>()
                    .map_err(|_| ArgsError::InvalidValue("host", value))?;
                result.host = Some(host);
            }
            Short('p') | Long("port") => {
                let value: String = parser.value()?.parse()?;
                let port = value
                    .parse::<u16>()
                    .map_err(|_| ArgsError::InvalidValue("port", value))?;
                result.port = Some(port);
            }
            Short('t') | Long("timeout") => {
                let value: String = parser.value()?.parse()?;
                let secs = value
                    .parse::<u64>()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .ok_or(ArgsError::InvalidValue("timeout", value))?;
                result.timeout_secs = Some(secs);
            }
            Short('c') | Long("config") => result.config = Some(parser.value()?.parse()?),
            Short('k') | Long("hash") => result.hash = Some(parser.value()?.parse()?),
            Short('s') | Long("sessions-dir") => {
                result.sessions_dir = Some(parser.value()?.parse()?)
            }
            Long("shell") => result.shell = Some(parser.value()?.parse()?),
            Long("no-auth") => result.no_auth = true,
            Short('l') | Long("log-level") => result.log_level = Some(parser.value()?.parse()?),
            Value(val) => {
                return Err(ArgsError::UnexpectedArgument(val.to_string_lossy().into()));
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"shell-relay {version}
Persistent named shell sessions over HTTP

USAGE:
    shell-relay [OPTIONS]

OPTIONS:
    -H, --host <ADDR>          Host address to bind [default: 127.0.0.1]
    -p, --port <PORT>          Port to listen on [default: 3000]
    -c, --config <FILE>        Path to configuration file (JSON)
    -k, --hash <SECRET>        Shared secret required as ?hash= (32+ chars)
    -s, --sessions-dir <DIR>   Ticket directory [default: sessions]
        --shell <PATH>         Shell program [default: /bin/bash, else /bin/sh]
    -t, --timeout <SECS>       Per-command timeout [default: 300]
    -l, --log-level <LVL>      Log level (error, warn, info, debug, trace)
        --no-auth              Disable the shared-secret check
    -h, --help                 Print help
    -V, --version              Print version

ENVIRONMENT VARIABLES:
    SHELL_RELAY_HOST           Host address
    SHELL_RELAY_PORT           Port number
    SHELL_RELAY_HASH           Shared secret
    SHELL_RELAY_SHELL          Shell program
    SHELL_RELAY_SESSIONS_DIR   Ticket directory
    SHELL_RELAY_TIMEOUT_SECS   Per-command timeout
    SHELL_RELAY_LOG_LEVEL      Log level
    RUST_LOG                   Full tracing filter (wins over the log level)

    Variables may also be placed in a .env file in the working directory.

EXAMPLES:
    # Start with defaults (localhost:3000, no secret)
    shell-relay

    # Listen on all interfaces and require a secret
    shell-relay -H 0.0.0.0 -k "$(openssl rand -hex 32)"

    # Start with config file
    shell-relay -c /etc/shell-relay/config.json
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("shell-relay {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// Unexpected positional argument.
    UnexpectedArgument(String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::UnexpectedArgument(arg) => {
                write!(f, "unexpected argument: '{}'", arg)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(args: &[&str]) -> Vec<OsString> {
        std::iter::once("shell-relay")
            .chain(args.iter().copied())
            .map(OsString::from)
            .collect()
    }

    #[test]
    fn test_no_flags_leaves_everything_unset() {
        let result = parse_args_from(args(&[])).unwrap();
        assert!(result.host.is_none());
        assert!(result.port.is_none());
        assert!(result.hash.is_none());
        assert!(!result.no_auth);
        assert!(!result.help);
    }

    #[test]
    fn test_host_port() {
        let result = parse_args_from(args(&["-H", "0.0.0.0", "--port", "8080"])).unwrap();
        assert_eq!(result.host.map(|h| h.to_string()), Some("0.0.0.0".into()));
        assert_eq!(result.port, Some(8080));
    }

    #[test]
    fn test_relay_options() {
        let result = parse_args_from(args(&[
            "-k",
            "0123456789abcdef0123456789abcdef",
            "-s",
            "/var/lib/relay",
            "--shell",
            "/bin/sh",
            "-t",
            "30",
            "-l",
            "debug",
        ]))
        .unwrap();

        assert_eq!(
            result.hash.as_deref(),
            Some("0123456789abcdef0123456789abcdef")
        );
        assert_eq!(result.sessions_dir, Some(PathBuf::from("/var/lib/relay")));
        assert_eq!(result.shell, Some(PathBuf::from("/bin/sh")));
        assert_eq!(result.timeout_secs, Some(30));
        assert_eq!(result.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_config_and_no_auth() {
        let result = parse_args_from(args(&["-c", "/etc/config.json", "--no-auth"])).unwrap();
        assert_eq!(result.config, Some(PathBuf::from("/etc/config.json")));
        assert!(result.no_auth);
    }

    #[test]
    fn test_help_and_version_flags() {
        assert!(parse_args_from(args(&["-h"])).unwrap().help);
        assert!(parse_args_from(args(&["--help"])).unwrap().help);
        assert!(parse_args_from(args(&["-V"])).unwrap().version);
        assert!(parse_args_from(args(&["--version"])).unwrap().version);
    }

    #[test]
    fn test_invalid_values() {
        assert!(parse_args_from(args(&["-p", "invalid"])).is_err());
        assert!(parse_args_from(args(&["-H", "not-an-ip"])).is_err());
        assert!(parse_args_from(args(&["-t", "0"])).is_err());
        assert!(parse_args_from(args(&["-t", "soon"])).is_err());
    }

    #[test]
    fn test_unexpected_positional() {
        let err = parse_args_from(args(&["serve"])).unwrap_err();
        assert!(matches!(err, ArgsError::UnexpectedArgument(ref a) if a == "serve"));
        assert_eq!(err.to_string(), "unexpected argument: 'serve'");
    }
}
