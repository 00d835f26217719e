//! naner - portable vendor bootstrapper CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use naner_cli::{Cli, Commands, Context, cmd};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = Context::load(cli.root, cli.catalog)?;

    match cli.command {
        Commands::Install { vendors } => cmd::install::install(ctx, &vendors).await,
        Commands::Update { vendors } => cmd::install::update(ctx, &vendors).await,
        Commands::List => cmd::list::list(&ctx),
        Commands::Resolve { vendor } => cmd::resolve::resolve(ctx, &vendor).await,
    }
}
