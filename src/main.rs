//! Main entry point for the repo-harvester CLI

use clap::Parser;
use repo_harvester::cli::Cli;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Initialize tracing on stderr with optional JSON formatting
fn init_tracing(debug: bool) {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let default_level = if debug {
        "repo_harvester=debug"
    } else {
        "repo_harvester=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Usage errors exit here, before any network activity
    let cli = Cli::parse();

    init_tracing(cli.debug);

    if let Err(e) = cli.execute().await.map_err(|e| anyhow::anyhow!(e)) {
        error!("Harvest failed: {}", e);
        std::process::exit(1);
    }
}
