//! Headless floatview shell.
//!
//! Loads plugins from the configured directory against a console window and
//! content surface, binds host shortcuts from settings and then reads
//! commands from stdin. See `help` at the prompt.
use std::{
    io,
    path::PathBuf,
    process::ExitCode,
    sync::Arc,
};

use clap::{Parser, Subcommand};
use logging::{self as logshared, buffer::LogBuffer};
use plugin_runtime::{Error, RuntimeSettings, ui::ChannelUiThread};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*};

/// Console command parsing.
mod command;
/// Log-backed window and surface.
mod console;
mod shell;

use crate::shell::Shell;

#[derive(Parser, Debug)]
#[command(name = "floatview", about = "Floating web shell plugin host", version)]
/// Command-line interface for the `floatview` binary.
struct Cli {
    /// Optional subcommand.
    #[command(subcommand)]
    command: Option<Cmd>,

    /// Logging controls
    #[command(flatten)]
    log: logshared::LogArgs,

    /// Optional path to the settings file
    #[arg(long, value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Plugins directory (overrides settings)
    #[arg(long, value_name = "DIR")]
    plugins: Option<PathBuf>,

    /// Plugin data directory (overrides settings)
    #[arg(long, value_name = "DIR")]
    data: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
/// Top-level CLI subcommands.
enum Cmd {
    /// Load every plugin, report failures and exit.
    Check,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let logs = LogBuffer::default();
    tracing_subscriber::registry()
        .with(logshared::env_filter_from_spec(&cli.log.spec()))
        .with(fmt::layer().without_time().with_writer(io::stderr))
        .with(logs.layer())
        .try_init()
        .ok();

    match run(&cli, logs) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e.pretty());
            ExitCode::FAILURE
        }
    }
}

/// Resolve settings, load plugins and either report or enter the console.
fn run(cli: &Cli, logs: LogBuffer) -> Result<ExitCode, Error> {
    let settings = RuntimeSettings::resolve(cli.settings.as_deref())?;
    let plugins_dir = cli.plugins.clone().unwrap_or_else(|| settings.plugins_dir());
    let data_dir = cli.data.clone().unwrap_or_else(|| settings.data_dir());
    info!(plugins = %plugins_dir.display(), data = %data_dir.display(), "floatview_start");

    let ui = Arc::new(ChannelUiThread::spawn("floatview-ui")?);
    let mut shell = Shell::new(&settings, &data_dir, ui.clone(), logs);
    let failures = shell.load_all(&plugins_dir);
    for (path, e) in &failures {
        error!(path = %path.display(), "{}", e.pretty());
    }

    let code = if let Some(Cmd::Check) = cli.command {
        println!(
            "{} loaded, {} failed",
            shell.manager().plugin_ids().len(),
            failures.len()
        );
        if failures.is_empty() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    } else {
        shell.repl(io::stdin().lock(), &mut io::stdout())?;
        ExitCode::SUCCESS
    };

    drop(shell);
    ui.shutdown();
    Ok(code)
}
