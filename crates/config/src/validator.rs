use crate::config::Config;
use log::{error, info};

pub const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

pub const VALID_STRATEGIES: &[&str] = &[
    "ordered",
    "random",
    "round-robin",
    "round_robin",
    "rr",
];

pub fn validate(config: &Config) -> bool {
    info!("Starting configuration validation...");

    // --- Validate cluster host ---
    if config.cluster.host.trim().is_empty() {
        error!("Cluster host is empty");
        return false;
    }

    if !config.cluster.host.starts_with("http://") {
        error!(
            "Invalid cluster host: expected an http:// URL, found '{}'",
            config.cluster.host
        );
        return false;
    }

    if config.cluster.timeout_ms == 0 {
        error!("Cluster request timeout is invalid (0)");
        return false;
    }

    // --- Validate log level ---
    if !VALID_LOG_LEVELS
        .iter()
        .any(|lvl| lvl.eq_ignore_ascii_case(&config.log.level))
    {
        error!("Invalid log level: {}", config.log.level);
        return false;
    }

    // --- Validate discovery ---
    let discovery = &config.discovery;
    if !VALID_STRATEGIES
        .iter()
        .any(|s| s.eq_ignore_ascii_case(&discovery.strategy))
    {
        error!("Invalid backend ordering strategy: {}", discovery.strategy);
        return false;
    }

    if discovery.refresh_interval_ms == 0 {
        error!("Discovery refresh interval is invalid (0)");
        return false;
    }

    if discovery.dial_timeout_ms == 0 {
        error!("Dial timeout is invalid (0)");
        return false;
    }

    if discovery.query_timeout_ms == 0 {
        error!("Discovery query timeout is invalid (0)");
        return false;
    }

    let health = &discovery.health_check;
    if health.failure_threshold == 0 {
        error!("Health check failure threshold is invalid (0)");
        return false;
    }

    if health.success_threshold == 0 {
        error!("Health check success threshold is invalid (0)");
        return false;
    }

    info!("Configuration validation passed successfully");

    true
}
