//! agentdock: session/tab supervision core runtime binary.

use clap::Parser;

mod cli;
mod replay;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = std::env::var("AGENTDOCK_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let args = cli::Cli::parse();
    match args.command {
        cli::Command::Replay(opts) => {
            replay::cmd_replay(&opts.transcript, opts.metrics).await?;
        }
    }

    Ok(())
}
