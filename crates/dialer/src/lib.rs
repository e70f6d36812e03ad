//! Dialer that fails over between the load-balanced API address and the API
//! servers discovered behind it.
//!
//! A [`Dialer`] is cheap to clone; clones share the discovered backend set.
//! [`Dialer::start`] runs discovery in the background until its
//! [`CancellationToken`] is cancelled, and [`Dialer::dial`] tries the
//! requested address and the discovered backends in the configured
//! [`DialOrder`].

use std::{
    io,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use log::{debug, error, warn};
use tokio::{net::TcpStream, runtime::Handle};
use tokio_util::sync::CancellationToken;

use multidialer_config::{
    config::{Discovery, HealthCheck},
    default::get_default_discovery,
};
use multidialer_lb::{BackendSet, LoadBalancing};
use multidialer_transport::{DialFn, DialFuture, default_dial_fn};

mod discovery;

pub use discovery::MembershipSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DialOrder {
    /// The requested address, then discovered backends.
    #[default]
    OriginalFirst,
    /// Discovered backends, then the requested address.
    BackendsFirst,
}

#[derive(Debug, Clone)]
pub struct DialerOptions {
    pub order: DialOrder,
    pub refresh_interval: Duration,
    pub dial_timeout: Duration,
    pub query_timeout: Duration,
    pub strategy: String,
    pub health_check: HealthCheck,
}

impl DialerOptions {
    pub fn from_discovery(discovery: &Discovery) -> Self {
        Self {
            order: DialOrder::default(),
            refresh_interval: Duration::from_millis(discovery.refresh_interval_ms.max(1)),
            dial_timeout: Duration::from_millis(discovery.dial_timeout_ms.max(1)),
            query_timeout: Duration::from_millis(discovery.query_timeout_ms.max(1)),
            strategy: discovery.strategy.clone(),
            health_check: discovery.health_check.clone(),
        }
    }

    pub fn with_order(mut self, order: DialOrder) -> Self {
        self.order = order;
        self
    }
}

impl Default for DialerOptions {
    fn default() -> Self {
        Self::from_discovery(&get_default_discovery())
    }
}

#[derive(Clone)]
pub struct Dialer {
    inner: Arc<Inner>,
}

struct Inner {
    base: DialFn,
    options: DialerOptions,
    backends: Mutex<BackendSet>,
    started: AtomicBool,
}

impl Dialer {
    /// Wraps `base`, or a plain TCP dial when absent. Does no I/O.
    pub fn new(base: Option<DialFn>) -> Self {
        Self::with_options(base, DialerOptions::default())
    }

    pub fn with_options(base: Option<DialFn>, options: DialerOptions) -> Self {
        let load_balancer = LoadBalancing::from_config(&options.strategy).unwrap_or_else(|err| {
            warn!("{err}; using round-robin");
            LoadBalancing::default()
        });
        let backends = BackendSet::new(options.health_check.clone(), load_balancer);

        Self {
            inner: Arc::new(Inner {
                base: base.unwrap_or_else(default_dial_fn),
                options,
                backends: Mutex::new(backends),
                started: AtomicBool::new(false),
            }),
        }
    }

    pub fn options(&self) -> &DialerOptions {
        &self.inner.options
    }

    /// Snapshot of the discovered backends, sorted.
    pub fn backends(&self) -> Vec<String> {
        self.lock().pool().addresses()
    }

    /// [`Dialer::dial`] as a dial function for a client configuration.
    pub fn dial_fn(&self) -> DialFn {
        let dialer = self.clone();
        Arc::new(move |network: &str, address: &str| -> DialFuture {
            let dialer = dialer.clone();
            let network = network.to_string();
            let address = address.to_string();
            Box::pin(async move { dialer.dial(&network, &address).await })
        })
    }

    /// Tries each address in dial order until one connects. Returns the last
    /// error when every attempt fails.
    pub async fn dial(&self, network: &str, address: &str) -> io::Result<TcpStream> {
        let attempts = self.attempts(address);
        let timeout = self.inner.options.dial_timeout;

        let mut last_err = None;
        for target in &attempts {
            let is_backend = target != address;
            let result = tokio::time::timeout(timeout, (self.inner.base)(network, target.as_str()))
                .await
                .unwrap_or_else(|_| {
                    Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("dial {target} timed out after {timeout:?}"),
                    ))
                });

            match result {
                Ok(stream) => {
                    if is_backend {
                        self.lock().mark_success(target);
                    }
                    if target != &attempts[0] {
                        debug!("Connected to {target} for {address} after failover");
                    }
                    return Ok(stream);
                }
                Err(err) => {
                    debug!("Dial {network} {target} failed: {err}");
                    if is_backend {
                        self.lock().mark_failure(target);
                    }
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| io::Error::other(format!("nothing to dial for {address}"))))
    }

    /// Spawns the discovery loop on the current runtime and returns at once.
    /// Only the first call on a dialer (or any of its clones) has an effect.
    pub fn start<S>(&self, token: CancellationToken, source: S)
    where
        S: MembershipSource + Send + Sync + 'static,
    {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            warn!("Discovery already running for this dialer; ignoring start");
            return;
        }

        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                self.inner.started.store(false, Ordering::SeqCst);
                error!("Discovery disabled: no Tokio runtime available");
                return;
            }
        };

        handle.spawn(discovery::run(self.clone(), token, source));
    }

    fn attempts(&self, address: &str) -> Vec<String> {
        let backends = self.lock().candidates(address);

        let mut attempts = Vec::with_capacity(backends.len() + 1);
        match self.inner.options.order {
            DialOrder::OriginalFirst => {
                attempts.push(address.to_string());
                attempts.extend(backends);
            }
            DialOrder::BackendsFirst => {
                attempts.extend(backends);
                attempts.push(address.to_string());
            }
        }
        attempts
    }

    fn lock(&self) -> MutexGuard<'_, BackendSet> {
        self.inner
            .backends
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(order: DialOrder, addresses: &[&str]) -> Dialer {
        let mut options = DialerOptions::default().with_order(order);
        options.strategy = "ordered".to_string();
        let dialer = Dialer::with_options(None, options);
        dialer
            .lock()
            .replace(addresses.iter().map(|a| a.to_string()).collect());
        dialer
    }

    #[test]
    fn original_first_attempts() {
        let dialer = seeded(DialOrder::OriginalFirst, &["10.0.0.2:6443", "10.0.0.1:6443"]);
        assert_eq!(
            dialer.attempts("lb:6443"),
            vec!["lb:6443", "10.0.0.1:6443", "10.0.0.2:6443"]
        );
    }

    #[test]
    fn backends_first_attempts() {
        let dialer = seeded(DialOrder::BackendsFirst, &["10.0.0.1:6443", "10.0.0.2:6443"]);
        assert_eq!(
            dialer.attempts("lb:6443"),
            vec!["10.0.0.1:6443", "10.0.0.2:6443", "lb:6443"]
        );
    }

    #[test]
    fn requested_backend_is_not_tried_twice() {
        let dialer = seeded(DialOrder::BackendsFirst, &["10.0.0.1:6443", "10.0.0.2:6443"]);
        assert_eq!(
            dialer.attempts("10.0.0.1:6443"),
            vec!["10.0.0.2:6443", "10.0.0.1:6443"]
        );
    }

    #[test]
    fn empty_set_only_tries_the_original() {
        for order in [DialOrder::OriginalFirst, DialOrder::BackendsFirst] {
            let dialer = seeded(order, &[]);
            assert_eq!(dialer.attempts("lb:6443"), vec!["lb:6443"]);
        }
    }

    #[test]
    fn unknown_strategy_falls_back() {
        let mut options = DialerOptions::default();
        options.strategy = "weighted".to_string();
        let dialer = Dialer::with_options(None, options);
        assert!(dialer.backends().is_empty());
    }

    #[test]
    fn start_without_runtime_is_harmless() {
        struct Never;
        impl MembershipSource for Never {
            fn api_server_endpoints(
                &self,
            ) -> impl std::future::Future<
                Output = Result<Vec<String>, multidialer_transport::ClientError>,
            > + Send {
                std::future::pending()
            }
        }

        let dialer = Dialer::new(None);
        dialer.start(CancellationToken::new(), Never);
        assert!(!dialer.inner.started.load(Ordering::SeqCst));
    }
}
