//! Shell-relay binary entry point.

use std::process::ExitCode;
use std::sync::Arc;

use shell_relay::api::{serve, AppState};
use shell_relay::cli::{parse_args, print_help, print_version};
use shell_relay::config::Config;
use shell_relay::security::HashAuth;
use shell_relay::{logging, FsTicketStore, SessionRegistry, ShellRelay};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("Run with --help for usage.");
            return ExitCode::from(2);
        }
    };

    if args.help {
        print_help();
        return ExitCode::SUCCESS;
    }
    if args.version {
        print_version();
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    logging::init(&config.log_filter());
    info!("shell-relay v{}", env!("CARGO_PKG_VERSION"));

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let server = config.to_server_config()?;
    let options = config.to_shell_options();

    let tickets = FsTicketStore::init(&config.sessions.dir)?;
    info!(
        dir = %tickets.root().display(),
        shell = %options.program.display(),
        timeout_secs = options.command_timeout.as_secs(),
        "ticket store ready"
    );

    let auth = HashAuth::from_config(config.security.hash.as_deref());
    if !auth.is_enabled() {
        warn!("no hash configured, requests are not authenticated");
    }

    let relay = ShellRelay::new(SessionRegistry::new(options), Arc::new(tickets))
        .with_auto_create(config.sessions.auto_create);

    serve(server, AppState::new(relay, auth)).await?;
    Ok(())
}
