//! # SendCmd CLI Entry Point
//!
//! ## Usage
//!
//! ```bash
//! # Run a command server on the default port
//! sendcmd serve
//!
//! # Run a command on one host
//! sendcmd send 10.0.0.5 "cd C:\app;start app.exe"
//!
//! # Run a named command set from a host config file on every host it lists
//! sendcmd send -f hosts.json -c restart
//!
//! # Machine-readable report
//! sendcmd send -f hosts.json --json | jq .
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use argh::FromArgs;

use sendcmd_cli::{config, render};
use sendcmd_client::{DispatchConfig, Dispatcher};
use sendcmd_common::protocol::{Target, DEFAULT_PORT};
use sendcmd_server::{CommandServer, ServerConfig};

#[derive(FromArgs)]
/// sendcmd - run shell command batches on remote hosts
struct Cli {
    /// log filter used when RUST_LOG is not set (default: info)
    #[argh(option, long = "log-level", default = "\"info\".into()")]
    log_level: String,

    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Serve(ServeArgs),
    Send(SendArgs),
}

/// Arguments for running a command server.
///
/// The server handles each connection in its own session and stops after a
/// batch containing `exit` has been answered, or on Ctrl-C.
#[derive(FromArgs)]
#[argh(subcommand, name = "serve")]
/// run a command server
struct ServeArgs {
    /// interface to listen on
    #[argh(option, short = 'b', default = "\"0.0.0.0\".into()")]
    bind: String,

    /// port to listen on
    #[argh(option, short = 'p', default = "DEFAULT_PORT")]
    port: u16,

    /// limit for a single command in milliseconds
    ///
    /// A command still running at the limit is killed and reported as timed out.
    /// Must be between 1 and 3600000 (1 hour).
    #[argh(option, long = "command-timeout-ms", default = "30000")]
    command_timeout_ms: u64,

    /// maximum number of sessions served at once
    #[argh(option, long = "max-sessions")]
    max_sessions: Option<usize>,

    /// directory sessions start in (default: the server's working directory)
    #[argh(option, long = "workdir")]
    workdir: Option<PathBuf>,

    /// time running sessions get to finish on shutdown, in milliseconds
    #[argh(option, long = "shutdown-grace-ms", default = "30000")]
    shutdown_grace_ms: u64,
}

/// Arguments for dispatching command batches.
///
/// Give a hostname and a `;`-separated command line for a single host, or
/// read targets from a host config file. Without a command set the file's
/// `hosts` list is used.
#[derive(FromArgs)]
#[argh(subcommand, name = "send")]
/// send command batches to one or more hosts
struct SendArgs {
    /// host to run the command on
    #[argh(positional)]
    hostname: Option<String>,

    /// commands separated by ';'
    #[argh(positional)]
    command: Option<String>,

    /// port for the single-host form
    #[argh(option, short = 'p', default = "DEFAULT_PORT")]
    port: u16,

    /// host config file
    #[argh(option, short = 'f', default = "\"sendcmdconfig.json\".into()")]
    config: PathBuf,

    /// named command set from the host config file
    #[argh(option, short = 'c')]
    commandset: Option<String>,

    /// connect timeout per attempt in milliseconds
    #[argh(option, long = "timeout-ms", default = "5000")]
    timeout_ms: u64,

    /// limit for receiving a host's result in milliseconds
    #[argh(option, long = "response-timeout-ms", default = "300000")]
    response_timeout_ms: u64,

    /// connection attempts per host
    #[argh(option, long = "attempts", default = "1")]
    attempts: u32,

    /// print the report as JSON
    #[argh(switch)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // Logs go to stderr so `send --json` output stays clean on stdout
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Serve(args) => run_serve(args).await,
        Commands::Send(args) => run_send(args).await,
    }
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    let mut config = ServerConfig::new()
        .with_bind_addr(format!("{}:{}", args.bind, args.port))
        .with_command_timeout(Duration::from_millis(args.command_timeout_ms))
        .with_shutdown_grace(Duration::from_millis(args.shutdown_grace_ms));
    if let Some(max) = args.max_sessions {
        config = config.with_max_sessions(max);
    }
    if let Some(dir) = args.workdir {
        config = config.with_working_dir(dir);
    }

    tracing::info!("Command timeout: {}ms", args.command_timeout_ms);

    let server = CommandServer::bind(config).await?;

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, shutting down");
            shutdown.trigger();
        }
    });

    server.run().await?;
    Ok(())
}

async fn run_send(args: SendArgs) -> Result<()> {
    let targets = resolve_targets(&args)?;
    if targets.is_empty() {
        bail!("no hosts to send to");
    }

    let dispatcher = Dispatcher::new(dispatch_config(&args));
    let config = dispatcher.config();
    tracing::info!(
        "Dispatching to {} host(s): connect timeout {}ms x{} attempt(s), response timeout {}ms",
        targets.len(),
        config.connect_timeout.as_millis(),
        config.connect_attempts,
        config.response_timeout.as_millis()
    );

    let report = dispatcher.dispatch(targets).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render::render_report(&report));
        println!("{}", render::summary(&report));
    }

    if !report.all_succeeded() {
        bail!("{} of {} host(s) did not complete cleanly", report.failures().count(), report.len());
    }
    Ok(())
}

fn dispatch_config(args: &SendArgs) -> DispatchConfig {
    DispatchConfig {
        connect_timeout: Duration::from_millis(args.timeout_ms),
        response_timeout: Duration::from_millis(args.response_timeout_ms),
        ..DispatchConfig::default()
    }
    .with_connect_attempts(args.attempts)
}

fn resolve_targets(args: &SendArgs) -> Result<Vec<Target>> {
    match (&args.commandset, &args.hostname, &args.command) {
        (Some(set), None, None) => config::load_targets(&args.config, Some(set.as_str())),
        (None, Some(host), Some(command)) => config::single_host(host, args.port, command),
        (None, None, None) => config::load_targets(&args.config, None),
        (Some(_), _, _) => bail!("--commandset cannot be combined with a hostname and command"),
        (None, _, _) => bail!("give both a hostname and a command, or use --commandset"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_serve_defaults() {
        let args: Cli = Cli::from_args(&["sendcmd"], &["serve"]).unwrap();
        assert_eq!(args.log_level, "info");
        match args.command {
            Commands::Serve(ServeArgs { bind, port, command_timeout_ms, max_sessions, workdir, shutdown_grace_ms }) => {
                assert_eq!(bind, "0.0.0.0");
                assert_eq!(port, 52000);
                assert_eq!(command_timeout_ms, 30000);
                assert_eq!(shutdown_grace_ms, 30000);
                assert!(max_sessions.is_none());
                assert!(workdir.is_none());
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_cli_parse_serve_options() {
        let args: Cli = Cli::from_args(&["sendcmd"], &[
            "--log-level", "debug",
            "serve",
            "-b", "127.0.0.1",
            "-p", "6000",
            "--command-timeout-ms", "1500",
            "--max-sessions", "4",
            "--workdir", "/srv",
        ]).unwrap();
        assert_eq!(args.log_level, "debug");
        match args.command {
            Commands::Serve(args) => {
                assert_eq!(args.bind, "127.0.0.1");
                assert_eq!(args.port, 6000);
                assert_eq!(args.command_timeout_ms, 1500);
                assert_eq!(args.max_sessions, Some(4));
                assert_eq!(args.workdir, Some(PathBuf::from("/srv")));
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_cli_parse_send_single_host() {
        let args: Cli = Cli::from_args(&["sendcmd"], &["send", "10.0.0.5", "cd /srv;make"]).unwrap();
        match args.command {
            Commands::Send(args) => {
                assert_eq!(args.hostname.as_deref(), Some("10.0.0.5"));
                assert_eq!(args.command.as_deref(), Some("cd /srv;make"));
                assert_eq!(args.port, 52000);
                assert_eq!(args.config, PathBuf::from("sendcmdconfig.json"));
                assert!(args.commandset.is_none());
                assert_eq!(args.timeout_ms, 5000);
                assert_eq!(args.response_timeout_ms, 300000);
                assert_eq!(args.attempts, 1);
                assert!(!args.json);

                let targets = resolve_targets(&args).unwrap();
                assert_eq!(targets.len(), 1);
                assert_eq!(targets[0].commands.commands, vec!["cd /srv", "make"]);
            }
            _ => panic!("Expected Send command"),
        }
    }

    #[test]
    fn test_cli_parse_send_commandset() {
        let args: Cli = Cli::from_args(&["sendcmd"], &[
            "send",
            "-f", "hosts.json",
            "-c", "restart",
            "--attempts", "3",
            "--json",
        ]).unwrap();
        match args.command {
            Commands::Send(args) => {
                assert!(args.hostname.is_none());
                assert_eq!(args.config, PathBuf::from("hosts.json"));
                assert_eq!(args.commandset.as_deref(), Some("restart"));
                assert_eq!(args.attempts, 3);
                assert!(args.json);

                let dispatcher = Dispatcher::new(dispatch_config(&args));
                assert_eq!(dispatcher.config().connect_attempts, 3);
                assert_eq!(dispatcher.config().connect_timeout, Duration::from_millis(5000));
                assert_eq!(dispatcher.config().response_timeout, Duration::from_millis(300000));
            }
            _ => panic!("Expected Send command"),
        }
    }

    #[test]
    fn test_zero_attempts_still_connects_once() {
        let args: Cli = Cli::from_args(&["sendcmd"], &["send", "h", "ls", "--attempts", "0"]).unwrap();
        match args.command {
            Commands::Send(args) => {
                let dispatcher = Dispatcher::new(dispatch_config(&args));
                assert_eq!(dispatcher.config().connect_attempts, 1);
            }
            _ => panic!("Expected Send command"),
        }
    }

    #[test]
    fn test_resolve_targets_rejects_partial_single_host() {
        let args: Cli = Cli::from_args(&["sendcmd"], &["send", "10.0.0.5"]).unwrap();
        match args.command {
            Commands::Send(args) => assert!(resolve_targets(&args).is_err()),
            _ => panic!("Expected Send command"),
        }

        let args: Cli = Cli::from_args(&["sendcmd"], &["send", "-c", "restart", "h", "ls"]).unwrap();
        match args.command {
            Commands::Send(args) => assert!(resolve_targets(&args).is_err()),
            _ => panic!("Expected Send command"),
        }
    }

    #[test]
    fn test_cli_parse_invalid() {
        assert!(Cli::from_args(&["sendcmd"], &["send", "-p", "notaport"]).is_err());
        assert!(Cli::from_args(&["sendcmd"], &["launch"]).is_err());
    }
}
