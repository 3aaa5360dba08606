use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "iris", about = "Notification bridge between a monitoring host and chat rooms", version)]
pub struct Cli {
    #[arg(
        long,
        env = "IRIS_BIND",
        default_value = "127.0.0.1:3400",
        help = "Address the bridge server listens on."
    )]
    pub bind: String,

    #[arg(
        long = "base-url",
        env = "IRIS_BASE_URL",
        default_value = "http://127.0.0.1:3400",
        help = "Public base URL used for self links in the descriptor document."
    )]
    pub base_url: String,

    #[arg(
        long = "host-base-url",
        env = "IRIS_HOST_BASE_URL",
        help = "Base URL of the monitoring host whose event links are unfurled."
    )]
    pub host_base_url: String,

    #[arg(
        long = "host-fixtures",
        env = "IRIS_HOST_FIXTURES",
        help = "Optional JSON file seeding the in-memory host directory."
    )]
    pub host_fixtures: Option<PathBuf>,
}
