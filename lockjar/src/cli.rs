// lockjar/src/cli.rs
//! Defines the command-line argument structure using clap.
use clap::{ArgAction, Parser, Subcommand};
use lockjar_common::error::Result;
use lockjar_common::Config;

pub mod outdated;
pub mod pack;
pub mod resolve;
pub mod verify;

use crate::cli::outdated::OutdatedArgs;
use crate::cli::pack::PackArgs;
use crate::cli::resolve::ResolveArgs;
use crate::cli::verify::VerifyArgs;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, name = "lockjar", bin_name = "lockjar")]
#[command(propagate_version = true)]
pub struct CliArgs {
    /// Log more (-v debug, -vv trace) and show event details.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve root artifacts into a lock file and import rules.
    Resolve(ResolveArgs),
    /// Report artifacts with newer versions available.
    Outdated(OutdatedArgs),
    /// Build a reproducible zip archive.
    Pack(PackArgs),
    /// Check local artifacts against the digests in a lock file.
    Verify(VerifyArgs),
}

impl Command {
    pub async fn run(&self, config: &Config) -> Result<()> {
        match self {
            Self::Resolve(command) => command.run(config).await,
            Self::Outdated(command) => command.run(config).await,
            Self::Pack(command) => command.run().await,
            Self::Verify(command) => command.run().await,
        }
    }
}

/// Non-empty, trimmed lines of a list file.
pub(crate) fn read_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) fn join_error(e: tokio::task::JoinError) -> lockjar_common::LockjarError {
    lockjar_common::LockjarError::Generic(format!("background task failed: {e}"))
}
