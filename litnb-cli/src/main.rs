//! # litnb CLI
//!
//! Command-line interface for the litnb literate-notebook processor.

mod commands;

use clap::{Parser, Subcommand};
use litnb_core::config::CONFIG_FILE;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "litnb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(long, env = "LITNB_CONFIG", default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the stage pipeline over a notebook or a directory of notebooks
    Process {
        /// Notebook file or directory
        path: PathBuf,

        /// Output directory (required for directories; stdout otherwise)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Skip the execution stage
        #[arg(long)]
        no_exec: bool,

        /// Emit the exported module source instead of the notebook
        #[arg(long)]
        exports: bool,
    },

    /// List the available stages and which ones the config enables
    Stages {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; stdout is reserved for command output
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if cli.verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::INFO.into()
            }),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Process {
            path,
            out,
            no_exec,
            exports,
        } => {
            let opts = commands::ProcessOptions {
                out,
                no_exec,
                exports,
            };
            commands::process_notebooks(&cli.config, &path, opts)
        }
        Commands::Stages { json } => commands::list_stages(&cli.config, json),
    }
}
