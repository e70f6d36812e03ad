use std::{
    fs::{OpenOptions, create_dir_all},
    path::Path,
};

use env_logger::{Builder, Target};
use log::LevelFilter;
use multidialer_config::config::Log;

pub fn parse_level(log_level: &str) -> Option<LevelFilter> {
    match log_level.to_lowercase().as_str() {
        "trace" => Some(LevelFilter::Trace),
        "debug" => Some(LevelFilter::Debug),
        "info" => Some(LevelFilter::Info),
        "warn" => Some(LevelFilter::Warn),
        "error" => Some(LevelFilter::Error),
        "off" => Some(LevelFilter::Off),
        _ => None,
    }
}

pub fn init_logger(log: &Log) -> Result<(), String> {
    let level = parse_level(&log.level).unwrap_or_else(|| {
        eprintln!("Invalid log level '{}', defaulting to 'info'", log.level);
        LevelFilter::Info
    });

    let mut builder = Builder::new();
    builder.filter_level(level).format_timestamp_secs();

    // only write to file if configured
    if let Some(log_file) = &log.file {
        if let Some(parent) = Path::new(log_file).parent() {
            create_dir_all(parent)
                .map_err(|err| format!("Failed to create log directory: {err}"))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .map_err(|err| format!("Failed to open log file '{log_file}': {err}"))?;

        builder.target(Target::Pipe(Box::new(file)));
    }
    // else → default (stderr)

    builder
        .try_init()
        .map_err(|err| format!("Logger already initialised: {err}"))
}
