use crate::config::{Discovery, HealthCheck, Log};

// default values
pub fn get_default_timeout_ms() -> u64 {
    5000
}

pub fn get_default_refresh_interval_ms() -> u64 {
    30_000
}

pub fn get_default_dial_timeout_ms() -> u64 {
    3000
}

pub fn get_default_query_timeout_ms() -> u64 {
    10_000
}

pub fn get_default_strategy() -> String {
    String::from("round-robin")
}

pub fn get_default_failure_threshold() -> u32 {
    1
}

pub fn get_default_success_threshold() -> u32 {
    1
}

pub fn get_default_cooldown_ms() -> u64 {
    10_000
}

pub fn get_default_log_level() -> String {
    String::from("info")
}

pub fn get_default_health_check() -> HealthCheck {
    HealthCheck {
        failure_threshold: get_default_failure_threshold(),
        success_threshold: get_default_success_threshold(),
        cooldown_ms: get_default_cooldown_ms(),
    }
}

pub fn get_default_discovery() -> Discovery {
    Discovery {
        refresh_interval_ms: get_default_refresh_interval_ms(),
        dial_timeout_ms: get_default_dial_timeout_ms(),
        query_timeout_ms: get_default_query_timeout_ms(),
        strategy: get_default_strategy(),
        health_check: get_default_health_check(),
    }
}

pub fn get_default_log() -> Log {
    Log {
        level: get_default_log_level(),
        file: None,
    }
}
