//! Binary entry point: parses flags, seeds the host directory, runs the
//! bridge server until interrupted.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use iris_host::{HostDirectory, InMemoryHostDirectory};
use iris_server::{run_bridge_server, ServerConfig};

mod bootstrap_helpers;
mod cli_args;
mod host_fixtures;

use bootstrap_helpers::init_tracing;
use cli_args::Cli;
use host_fixtures::load_host_fixtures;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let directory = match &cli.host_fixtures {
        Some(path) => {
            let directory = load_host_fixtures(path)?;
            tracing::info!(path = %path.display(), "seeded host directory from fixtures");
            directory
        }
        None => InMemoryHostDirectory::new(),
    };
    let host: Arc<dyn HostDirectory> = Arc::new(directory);

    let config = ServerConfig::new(cli.bind, cli.base_url, cli.host_base_url);
    run_bridge_server(config, host).await
}
