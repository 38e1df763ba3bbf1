//! sqlgate - an HTTP gateway that runs SQL against several database engines.

mod cli;

use anyhow::Context;
use cli::Cli;
use sqlgate::config::Config;
use sqlgate::gateway::Gateway;
use sqlgate::{logging, server};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    logging::init_stderr_logging();

    if let Err(e) = run().await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse_args();

    // Precedence: CLI arguments, then the config file, then defaults.
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;
    cli.apply(&mut config);

    let settings = config.gateway_settings()?;
    let addr = config.listen_addr()?;
    info!(
        "Request deadline {}s, {} connection attempts",
        settings.deadline.as_secs(),
        settings.connector.retry.max_attempts
    );

    server::serve(Gateway::new(settings), addr)
        .await
        .with_context(|| format!("server on {addr} failed"))
}
