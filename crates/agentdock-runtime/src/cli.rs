//! CLI definition using clap derive.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "agentdock", about = "session supervision core for AI coding agents")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Reconstruct a recorded transcript and print a summary
    Replay(ReplayOpts),
}

#[derive(clap::Args)]
pub struct ReplayOpts {
    /// Newline-delimited record transcript file
    #[arg(long, env = "AGENTDOCK_TRANSCRIPT")]
    pub transcript: PathBuf,

    /// Print derived run metrics after the transcript
    #[arg(long)]
    pub metrics: bool,
}
