//! graph-oplog CLI
//!
//! Replays scripted commits against an in-memory store and prints the
//! operations a peer would receive.

use anyhow::Result;
use clap::Parser;
use graph_oplog::cli::{self, ReplayScript};
use graph_oplog::sync::DeriveOptions;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Config file to use instead of the default lookup
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    cmd: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Apply a JSON script of transactions and print derived batches
    Replay {
        script: PathBuf,
        /// Print derivation counters after the batches
        #[clap(long)]
        stats: bool,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = cli::load_config(args.config.as_deref())?;
    cli::init_logging(&config.logging)?;

    match args.cmd {
        Command::Replay { script, stats } => {
            let script = ReplayScript::load(&script)?;
            let outcome = cli::run_replay(&script, DeriveOptions::from(&config.derive)).await?;
            let mut stdout = std::io::stdout().lock();
            cli::write_outcome(&mut stdout, &outcome, stats)?;
        }
        Command::Config => {
            print!("{}", config.to_toml_string()?);
        }
    }

    Ok(())
}
