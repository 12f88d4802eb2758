//! CLI tools for the tribunal dispute protocol.
//!
//! Works over JSON memory images: compute committed roots, generate and
//! check inclusion proofs, step the reference machine, and play out a
//! scripted dispute end to end.

mod commands;

use anyhow::{anyhow, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing::Level;

#[derive(Parser)]
#[command(name = "tribunal")]
#[command(about = "Dispute-resolution protocol tools", long_about = None)]
#[command(version)]
struct Cli {
    /// Verbosity level (0-4)
    #[arg(long, short, action = ArgAction::Count, global = true)]
    v: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the committed root of a memory image
    Root {
        /// Path to the memory image
        image: String,
    },

    /// Generate an inclusion proof for one word
    Prove {
        /// Path to the memory image
        image: String,

        /// Byte address of the word, hex or decimal
        #[arg(long)]
        addr: String,

        /// Write the proof to this file instead of stdout
        #[arg(long, short)]
        output: Option<String>,
    },

    /// Check an inclusion proof file
    Verify {
        /// Path to the proof file
        proof: String,
    },

    /// Step the reference machine over a memory image
    Run {
        /// Path to the memory image
        image: String,

        /// Stop after this many steps even if still advancing
        #[arg(long, default_value_t = 10_000)]
        max_steps: u64,

        /// Print the committed root after every step
        #[arg(long)]
        trace_roots: bool,
    },

    /// Play a scripted dispute between an honest and a corrupted party
    Simulate {
        /// Path to the memory image of the machine under dispute
        image: String,

        /// Committed step count
        #[arg(long, default_value_t = 9)]
        steps: u64,

        /// Step after which the challenger's history goes wrong
        #[arg(long)]
        corrupt_at: Option<u64>,

        /// Write a snapshot of the settled game to this file
        #[arg(long)]
        snapshot: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing_subscriber(cli.v)?;

    match cli.command {
        Commands::Root { image } => commands::root(&image),
        Commands::Prove { image, addr, output } => {
            commands::prove(&image, &addr, output.as_deref())
        }
        Commands::Verify { proof } => commands::verify(&proof),
        Commands::Run { image, max_steps, trace_roots } => {
            commands::run(&image, max_steps, trace_roots)
        }
        Commands::Simulate { image, steps, corrupt_at, snapshot } => {
            commands::simulate(&image, steps, corrupt_at, snapshot.as_deref())
        }
    }
}

fn init_tracing_subscriber(verbosity_level: u8) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(match verbosity_level {
            0 => Level::ERROR,
            1 => Level::WARN,
            2 => Level::INFO,
            3 => Level::DEBUG,
            _ => Level::TRACE,
        })
        .finish();
    tracing::subscriber::set_global_default(subscriber).map_err(|e| anyhow!(e))
}
