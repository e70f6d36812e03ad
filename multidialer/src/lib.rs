//! Resilient API-server clients.
//!
//! [`ClientFactory::new_for_config`] builds a [`ClusterClient`] in one of two
//! modes:
//!
//! 1. **Failover** (default): every connection tries the original,
//!    load-balanced address first and falls back to the discovered API
//!    servers only when it fails.
//! 2. **Load-balancer bypass**: every connection tries the discovered API
//!    servers first and falls back to the original address only when all of
//!    them are down.
//!
//! The mode comes from `MULTI_DIALER_LOAD_BALANCER_BYPASS`, resolved once with
//! [`Settings::from_env`]. Discovery runs until the [`CancellationToken`]
//! passed at construction is cancelled.

use log::debug;
use tokio_util::sync::CancellationToken;

pub use multidialer_config::settings::{Mode, Settings, SettingsError};
pub use multidialer_dialer::{DialOrder, Dialer, DialerOptions};
pub use multidialer_transport::{ClientError, ClusterClient, ConnectionConfig};

#[derive(Debug, Clone, Default)]
pub struct ClientFactory {
    mode: Mode,
    options: DialerOptions,
}

impl ClientFactory {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            options: DialerOptions::default(),
        }
    }

    /// Resolves the mode from the environment; an unparsable value is an error.
    pub fn from_env() -> Result<Self, SettingsError> {
        Ok(Self::new(Settings::from_env()?.mode))
    }

    /// Refresh interval, dial timeout, ordering and health thresholds for
    /// every dialer this factory builds. The dial order is set per mode.
    pub fn with_options(mut self, options: DialerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn new_for_config(
        &self,
        token: &CancellationToken,
        config: &ConnectionConfig,
    ) -> Result<ClusterClient, ClientError> {
        match self.mode {
            Mode::LoadBalancerBypass => self.load_balancer_bypass_client(token, config),
            Mode::Failover => self.failover_client(token, config),
        }
    }

    /// Client whose dialer tries the original address first. Discovery runs
    /// through that same client, so it fails over too.
    pub fn failover_client(
        &self,
        token: &CancellationToken,
        config: &ConnectionConfig,
    ) -> Result<ClusterClient, ClientError> {
        let mut config = config.clone();
        let dialer = Dialer::with_options(
            config.dial.take(),
            self.options.clone().with_order(DialOrder::OriginalFirst),
        );
        config.dial = Some(dialer.dial_fn());

        let client = ClusterClient::new_for_config(&config)?;
        dialer.start(token.clone(), client.clone());
        debug!("Failover client ready for {}", client.host());
        Ok(client)
    }

    /// Client whose dialer tries discovered backends first. Discovery uses a
    /// separate client on the untouched configuration.
    pub fn load_balancer_bypass_client(
        &self,
        token: &CancellationToken,
        config: &ConnectionConfig,
    ) -> Result<ClusterClient, ClientError> {
        let mut config = config.clone();
        let own = ClusterClient::new_for_config(&config)?;

        let dialer = Dialer::with_options(
            config.dial.take(),
            self.options.clone().with_order(DialOrder::BackendsFirst),
        );
        dialer.start(token.clone(), own);

        config.dial = Some(dialer.dial_fn());
        let client = ClusterClient::new_for_config(&config)?;
        debug!("Load-balancer bypass client ready for {}", client.host());
        Ok(client)
    }
}

/// [`ClientFactory::new_for_config`] with default dialer options.
pub fn new_for_config(
    mode: Mode,
    token: &CancellationToken,
    config: &ConnectionConfig,
) -> Result<ClusterClient, ClientError> {
    ClientFactory::new(mode).new_for_config(token, config)
}
