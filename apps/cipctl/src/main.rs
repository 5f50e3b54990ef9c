mod analyze;
mod cli;
mod config;
mod provider;

use anyhow::Result;
use clap::Parser;

use crate::cli::{Cli, Commands};

fn init_tracing() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,cipctl=info".into());
    // Logs go to stderr so `--json` output stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    Ok(())
}

fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();
    match cli.command {
        Commands::Analyze(args) => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(analyze::analyze(args))
        }
        Commands::Validate(args) => analyze::validate(args),
        Commands::Tags(args) => analyze::tags(args),
    }
}
