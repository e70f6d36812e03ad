pub mod client;
pub mod connector;
pub mod dial;
pub mod endpoints;

pub use client::{ClientError, ClusterClient, ConnectionConfig, VersionInfo};
pub use dial::{DialFn, DialFuture, default_dial_fn};
