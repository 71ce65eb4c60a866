//! chatflow CLI
//!
//! # Commands
//! - `chatflow new <dir>` - Write a starter flow and settings file
//! - `chatflow check <flow.toml>` - Validate a flow document
//! - `chatflow run <flow.toml>` - Chat through a flow in the terminal

mod check;
mod new;
mod run;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// chatflow command-line interface
#[derive(Parser)]
#[command(name = "chatflow")]
#[command(author, version, about = "Validate and run chatflow conversations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter flow.toml and settings.toml
    New {
        /// Target directory (created if missing)
        dir: PathBuf,

        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },

    /// Validate a flow document
    Check {
        /// Flow document
        flow: PathBuf,

        /// Settings file to validate alongside the flow
        #[arg(short, long)]
        settings: Option<PathBuf>,
    },

    /// Chat through a flow in the terminal
    Run {
        /// Flow document
        flow: PathBuf,

        /// Settings file (default: built-in defaults)
        #[arg(short, long)]
        settings: Option<PathBuf>,

        /// Answer stay turns by echoing the input back
        #[arg(long)]
        echo_responder: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::New { dir, force } => new::run_new_command(&dir, force),
        Commands::Check { flow, settings } => check::run_check_command(&flow, settings.as_deref()),
        Commands::Run {
            flow,
            settings,
            echo_responder,
        } => {
            chatflow_observe::try_init_stderr_tracing("warn,chatflow_runtime=info")?;
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(run::run_chat_command(&flow, settings.as_deref(), echo_responder))
        }
    }
}
