//! partstream command-line entry point.

mod app;
mod cli;
mod config;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let command = cli.command()?;
    let config = config::Config::load_from(&cli.config)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        store_root = %config.store_root.display(),
        chunk_size = config.transfer.chunk_size,
        "starting partstream"
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(config, command))
}
