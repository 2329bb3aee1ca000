//! Docweave CLI
//!
//! Command-line tools for writing markdown into block documents.
//!
//! # Commands
//!
//! - `sync` - Convert a markdown file and write it into a document
//! - `plan` - Partition and validate a saved conversion output
//! - `convert` - Run the reference markdown converter
//! - `version` - Show version information

mod client;
mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Docweave command-line tools.
#[derive(Parser)]
#[command(name = "docweave")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a markdown file and write it into a document
    Sync {
        /// Markdown file to write
        file: PathBuf,

        /// Target document ID
        #[arg(short, long)]
        document: String,

        /// Container block ID (defaults to the document root)
        #[arg(short, long)]
        container: Option<String>,

        /// Write into the in-memory reference store instead of the API
        #[arg(long)]
        memory: bool,

        #[command(flatten)]
        api: commands::sync::ApiArgs,

        #[command(flatten)]
        limits: commands::sync::LimitArgs,
    },

    /// Partition and validate a saved conversion output
    Plan {
        /// Conversion output (JSON with `blocks` and `first_level_block_ids`)
        file: PathBuf,

        /// Container block ID
        #[arg(short, long, default_value = "root")]
        container: String,

        /// Maximum blocks per batch
        #[arg(short, long, default_value = "500")]
        batch_size: usize,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Run the reference markdown converter and print its output
    Convert {
        /// Markdown file to convert
        file: PathBuf,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Sync {
            file,
            document,
            container,
            memory,
            api,
            limits,
        } => {
            let target = commands::sync::Target {
                document,
                container,
            };
            commands::sync::run(&file, &target, memory, &api, &limits).await?;
        }
        Commands::Plan {
            file,
            container,
            batch_size,
            format,
        } => {
            commands::plan::run(&file, &container, batch_size, &format)?;
        }
        Commands::Convert { file } => {
            commands::convert::run(&file)?;
        }
        Commands::Version => {
            println!("Docweave CLI v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "Server batch limit: {} blocks",
                docweave_engine::SERVER_MAX_BATCH
            );
        }
    }

    Ok(())
}
