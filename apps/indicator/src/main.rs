//! HS Companion tray indicator entry point.

mod app;
mod config;
mod stdio;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Keeps a wireless headset's volume in sync with the desktop", long_about = None)]
struct Cli {
    /// Configuration file (default: $XDG_CONFIG_HOME/hscompanion/indicator.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write snapshots as JSON lines to stdout and read intents from stdin
    #[arg(long, conflicts_with = "once")]
    stdio: bool,

    /// Detect the headset once, print the snapshot and exit
    #[arg(long)]
    once: bool,
}

/// Upper bound on waiting for the runtime's blocking threads at exit.
const RUNTIME_SHUTDOWN: Duration = Duration::from_millis(500);

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout belongs to --stdio and --once.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting HS Companion indicator"
    );

    let config = config::Config::load(cli.config.as_deref())?;
    tracing::info!(script = %config.script_path(), "configuration loaded");

    if cli.once {
        let snapshot = app::detect_once(&config)?;
        println!("{}", serde_json::to_string(&snapshot)?);
        return Ok(if snapshot.is_connected() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(app::run(config, cli.stdio));
    // Blocking work still in flight must not hold the process open.
    rt.shutdown_timeout(RUNTIME_SHUTDOWN);
    result?;

    tracing::info!("indicator shut down cleanly");
    Ok(ExitCode::SUCCESS)
}
