use serde::{Deserialize, Serialize};

use crate::default::{
    get_default_cooldown_ms, get_default_dial_timeout_ms, get_default_discovery,
    get_default_failure_threshold, get_default_health_check, get_default_log,
    get_default_log_level, get_default_query_timeout_ms, get_default_refresh_interval_ms,
    get_default_strategy, get_default_success_threshold, get_default_timeout_ms,
};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    pub cluster: Cluster,

    #[serde(default = "get_default_discovery")]
    pub discovery: Discovery,

    #[serde(default = "get_default_log")]
    pub log: Log,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Cluster {
    pub host: String, // "http://10.0.0.1:6443"

    #[serde(default)]
    pub bearer_token: Option<String>,

    #[serde(default = "get_default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Discovery {
    #[serde(default = "get_default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,

    #[serde(default = "get_default_dial_timeout_ms")]
    pub dial_timeout_ms: u64,

    // bound on a single membership query
    #[serde(default = "get_default_query_timeout_ms")]
    pub query_timeout_ms: u64,

    #[serde(default = "get_default_strategy")]
    pub strategy: String, // ordered | round-robin | random

    #[serde(default = "get_default_health_check")]
    pub health_check: HealthCheck,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct HealthCheck {
    #[serde(default = "get_default_failure_threshold")]
    pub failure_threshold: u32,

    #[serde(default = "get_default_success_threshold")]
    pub success_threshold: u32,

    #[serde(default = "get_default_cooldown_ms")]
    pub cooldown_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Log {
    #[serde(default = "get_default_log_level")]
    pub level: String, // "trace, debug, info, warn, error, off"

    // append to this file instead of stderr
    #[serde(default)]
    pub file: Option<String>,
}
