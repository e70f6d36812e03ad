//! multidialer probe: builds a resilient client from a config file and keeps
//! asking the API server for its version, logging each outcome.

use std::time::Duration;

use clap::Parser;
use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

use multidialer::{ClientFactory, ConnectionConfig, DialerOptions, Settings};
use multidialer_config::validator::validate as validate_config;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    // Sets a custom config file
    #[arg(short, long)]
    config: Option<String>,

    /// Milliseconds between probes
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,

    /// Stop after this many probes (runs until Ctrl-C when absent)
    #[arg(long)]
    count: Option<u64>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Resolve the connection mode before anything else; a bad value is fatal
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    let config_path = cli
        .config
        .unwrap_or_else(|| "./config/multidialer.yaml".to_string());

    let config = match multidialer_config::loader::read_config(&config_path) {
        Ok(cfg) => cfg,
        Err(err_msg) => {
            eprintln!("Error loading config: {}", err_msg);
            std::process::exit(1);
        }
    };

    if let Err(err) = multidialer_utils::logger::init_logger(&config.log) {
        eprintln!("{err}");
        std::process::exit(1);
    }

    if !validate_config(&config) {
        error!("Configuration validation failed. Exiting...");
        std::process::exit(1);
    }

    let connection = ConnectionConfig {
        host: config.cluster.host.clone(),
        bearer_token: config.cluster.bearer_token.clone(),
        timeout: Some(Duration::from_millis(config.cluster.timeout_ms)),
        dial: None,
    };

    let factory = ClientFactory::new(settings.mode)
        .with_options(DialerOptions::from_discovery(&config.discovery));

    let token = CancellationToken::new();
    let client = match factory.new_for_config(&token, &connection) {
        Ok(client) => client,
        Err(err) => {
            error!("Failed to build client for {}: {err}", connection.host);
            std::process::exit(1);
        }
    };
    info!("Probing {} in {:?} mode", client.host(), factory.mode());

    let interval = Duration::from_millis(cli.interval_ms.max(1));
    let mut sent = 0u64;
    loop {
        match client.version().await {
            Ok(version) => info!("API server {} ({})", version.git_version, version.platform),
            Err(err) => warn!("Probe failed: {err}"),
        }

        sent += 1;
        if cli.count.is_some_and(|count| sent >= count) {
            break;
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }

    token.cancel();
}
