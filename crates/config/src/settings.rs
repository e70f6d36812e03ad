//! Process-wide connection mode, resolved once from the environment.

use std::{env, fmt};

pub const ENV_LOAD_BALANCER_BYPASS: &str = "MULTI_DIALER_LOAD_BALANCER_BYPASS";

/// How a client reaches the API servers behind the load balancer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Dial the load-balanced address first, discovered backends only when it fails.
    #[default]
    Failover,
    /// Dial discovered backends first, the load-balanced address only when all of them fail.
    LoadBalancerBypass,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    InvalidBool { key: &'static str, value: String },
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::InvalidBool { key, value } => {
                write!(f, "Error parsing {key}: invalid boolean value {value:?}")
            }
        }
    }
}

impl std::error::Error for SettingsError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Settings {
    pub mode: Mode,
}

impl Settings {
    /// Reads [`ENV_LOAD_BALANCER_BYPASS`]. Call once at startup and pass the
    /// result around; an invalid value is an error, never a silent default.
    pub fn from_env() -> Result<Self, SettingsError> {
        let raw = env::var(ENV_LOAD_BALANCER_BYPASS).ok();
        Self::from_value(raw.as_deref())
    }

    pub fn from_value(raw: Option<&str>) -> Result<Self, SettingsError> {
        let bypass = match raw {
            Some(value) if !value.is_empty() => {
                parse_bool(value).ok_or_else(|| SettingsError::InvalidBool {
                    key: ENV_LOAD_BALANCER_BYPASS,
                    value: value.to_string(),
                })?
            }
            _ => false,
        };

        let mode = if bypass {
            Mode::LoadBalancerBypass
        } else {
            Mode::Failover
        };
        Ok(Self { mode })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}
