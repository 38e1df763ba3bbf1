//! Command-line argument parsing for sqlgate.

use clap::Parser;
use sqlgate::config::Config;
use std::path::PathBuf;

/// HTTP gateway that runs SQL against PostgreSQL, MySQL, ClickHouse and SQLite.
#[derive(Parser, Debug)]
#[command(name = "sqlgate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Address to listen on (overrides [server] listen)
    #[arg(short = 'l', long, value_name = "ADDR")]
    pub listen: Option<String>,

    /// Port to listen on (overrides the port of the listen address)
    #[arg(short = 'p', long, env = "PORT", value_name = "PORT")]
    pub port: Option<u16>,

    /// Request deadline in seconds (overrides [gateway] deadline_secs)
    #[arg(long, value_name = "SECS")]
    pub deadline_secs: Option<u64>,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path, using the platform default when not specified.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// Applies command-line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(listen) = &self.listen {
            config.server.listen = listen.clone();
        }
        if let Some(port) = self.port {
            config.server.listen = with_port(&config.server.listen, port);
        }
        if let Some(secs) = self.deadline_secs {
            config.gateway.deadline_secs = secs;
        }
    }
}

/// Replaces (or adds) the port of a `host:port` listen address.
fn with_port(listen: &str, port: u16) -> String {
    let host = match listen.rsplit_once(':') {
        Some((host, tail)) if !tail.contains(']') => host,
        _ => listen,
    };
    format!("{host}:{port}")
}
