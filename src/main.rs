//! `rdap` command-line client.
//!
//! ```text
//!   argv ──▶ config (file or defaults) ──▶ logging / metrics
//!                                     │
//!                                     ▼
//!                              RdapClient lookup
//!                                     │
//!                                     ▼
//!                          JSON on stdout, errors on stderr
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use rdap_client::config::{load_config, ClientConfig};
use rdap_client::observability::{logging, metrics};
use rdap_client::RdapClient;

#[derive(Parser)]
#[command(name = "rdap")]
#[command(about = "Query RDAP registries with automatic server discovery", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Expose Prometheus metrics on this address while the query runs
    #[arg(long)]
    metrics_address: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up a domain name
    Domain { name: String },
    /// Look up an IPv4/IPv6 address or prefix
    Ip { address: String },
    /// Look up an autonomous system number (e.g. AS15169)
    Autnum { asn: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {e}");
                return ExitCode::from(2);
            }
        },
        None => ClientConfig::default(),
    };
    if let Some(addr) = cli.metrics_address {
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = addr;
    }

    if let Err(e) = logging::init_logging(&config.observability) {
        eprintln!("Warning: logging not initialized: {e}");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let client = match RdapClient::new(config) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(2);
        }
    };

    let result = match &cli.command {
        Commands::Domain { name } => client.domain(name).await,
        Commands::Ip { address } => client.ip(address).await,
        Commands::Autnum { asn } => client.autnum(asn).await,
    };
    client.destroy();

    match result {
        Ok(response) => match serde_json::to_string_pretty(&response) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {e}");
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            tracing::debug!(kind = ?e.kind(), "Lookup failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
