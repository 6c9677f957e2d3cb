//! Command-line interface for the Techtile control plane.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use techtile_api::ServerState;
use techtile_control::{ControlConfig, ControlPlane, FileStatusStore, IcmpPinger, MqttBus};

/// Environment variable switching log output to JSON.
const LOG_JSON_ENV: &str = "TECHTILE_LOG_JSON";

/// Techtile control plane - dispatch shutdown and reboot commands to testbed devices.
#[derive(Parser, Debug)]
#[command(name = "techtile")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Connect to the broker and start the HTTP API.
    Serve {
        /// Configuration file (TOML).
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Host to bind to (overrides the config file).
        #[arg(long)]
        host: Option<String>,
        /// Port to bind to (overrides the config file).
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print the effective configuration and exit.
    Config {
        /// Configuration file (TOML).
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    match args.command {
        Command::Serve { config, host, port } => run_server(config.as_deref(), host, port).await,
        Command::Config { config } => print_config(config.as_deref()),
    }
}

fn init_logging(verbose: bool) {
    let json_logging = std::env::var(LOG_JSON_ENV)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    let level = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("techtile={}", level))
            .add_directive(tracing::Level::WARN.into())
    });

    if json_logging {
        // JSON format for production/container environments
        tracing_subscriber::fmt()
            .json()
            .with_writer(std::io::stderr)
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        // Logs go to stderr so `techtile config` output stays clean TOML
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .init();
    }
}

fn load_config(path: Option<&Path>) -> Result<ControlConfig> {
    ControlConfig::load(path).context("Failed to load configuration")
}

/// Print the configuration after file and environment overrides.
fn print_config(path: Option<&Path>) -> Result<()> {
    let config = load_config(path)?;
    print!("{}", config.to_toml()?);
    Ok(())
}

/// Run the control plane until Ctrl+C or SIGTERM.
async fn run_server(path: Option<&Path>, host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut config = load_config(path)?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let bind_addr = config.server.bind_addr();
    let bind = tokio::net::lookup_host(&bind_addr)
        .await
        .with_context(|| format!("Cannot resolve bind address {}", bind_addr))?
        .next()
        .with_context(|| format!("No address found for {}", bind_addr))?;

    tracing::info!(
        "Starting techtile {} (broker {}, topics {})",
        techtile_control::VERSION,
        config.mqtt.full_broker_addr(),
        config.topics
    );

    let bus = Arc::new(MqttBus::connect(&config.mqtt));
    let status = Arc::new(FileStatusStore::new(config.status_file.clone()));
    let control = Arc::new(ControlPlane::from_config(&config, bus.clone(), status));
    control
        .start()
        .await
        .context("Failed to start control plane")?;

    let pinger = Arc::new(IcmpPinger::new(config.server.ping_timeout()));
    let state = ServerState::new(control, pinger);
    let result = techtile_api::run(bind, state, config.server.cors).await;

    bus.disconnect().await;
    result
}
