//! # mxx
//!
//! Command-line interface for running emulator automation profiles.
//!
//! - `mxx run up <profile>...` starts profiles, optionally stopping them
//!   after their lifetime (`--kill`, `--kill-all`)
//! - `mxx run down [profile...]` stops profiles (all when none named)
//! - `mxx run next` runs the first profile not yet completed today
//! - `mxx run notify add|remove|list` manages profiles whose early exit
//!   counts as success
//!
//! Global `--var key[=value]` arguments are handed to every plugin.

mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use mxx_plugin::RunContext;
use mxx_runner::{MxxConfig, MxxPaths};
use tracing_subscriber::EnvFilter;

/// mxx: start, stop and schedule emulator automation profiles.
#[derive(Parser)]
#[command(name = "mxx", version, about)]
struct Cli {
    /// Context variable for plugins: `key` (sets "true") or `key=value`.
    #[arg(long = "var", value_name = "KEY[=VALUE]", global = true)]
    vars: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start, stop and schedule profiles.
    Run {
        #[command(subcommand)]
        command: commands::run::RunCommands,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("mxx=info".parse()?)
                .add_directive("mxx_runner=info".parse()?)
                .add_directive("mxx_process=info".parse()?)
                .add_directive("mxx_plugin=info".parse()?)
                .add_directive("mxx_completion=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let paths = MxxPaths::resolve()
        .context("cannot determine home directory; set MXX_CONFIG_DIR")?;
    let config = MxxConfig::load_or_default(&paths.config_file);
    let ctx = RunContext::from_var_args(&cli.vars);

    match &cli.command {
        Commands::Run { command } => commands::run::execute(command, &paths, &config, ctx),
    }
}
