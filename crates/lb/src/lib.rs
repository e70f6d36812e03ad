//! Discovered backend set with per-backend health and ordering policies.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use log::{info, warn};
use rand::seq::SliceRandom;

use multidialer_config::config::HealthCheck;

#[derive(Clone, Debug)]
pub struct BackendState {
    address: String,
    consecutive_failures: u32,
    health_state: HealthState,
}

#[derive(Clone, Debug)]
enum HealthState {
    Healthy,
    Unhealthy { until: Instant, successes: u32 },
}

#[derive(Debug, PartialEq, Eq)]
pub enum HealthTransition {
    BecameHealthy,
    BecameUnhealthy,
}

impl BackendState {
    pub fn new(address: String) -> Self {
        Self {
            address,
            consecutive_failures: 0,
            health_state: HealthState::Healthy,
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self.health_state, HealthState::Healthy)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn record_success(&mut self, health: &HealthCheck) -> Option<HealthTransition> {
        match &mut self.health_state {
            HealthState::Healthy => {
                self.consecutive_failures = 0;
                None
            }
            HealthState::Unhealthy { until, successes } => {
                if Instant::now() < *until {
                    return None;
                }

                *successes += 1;
                if *successes >= health.success_threshold {
                    self.consecutive_failures = 0;
                    self.health_state = HealthState::Healthy;
                    return Some(HealthTransition::BecameHealthy);
                }
                None
            }
        }
    }

    pub fn record_failure(&mut self, health: &HealthCheck) -> Option<HealthTransition> {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.consecutive_failures < health.failure_threshold {
            return None;
        }

        self.consecutive_failures = 0;
        let was_healthy = self.is_healthy();
        let cooldown = Duration::from_millis(health.cooldown_ms);
        self.health_state = HealthState::Unhealthy {
            until: Instant::now() + cooldown,
            successes: 0,
        };
        was_healthy.then_some(HealthTransition::BecameUnhealthy)
    }
}

/// Backends kept sorted by address and free of duplicates.
pub struct BackendPool {
    backends: Vec<BackendState>,
    health_check: HealthCheck,
}

impl BackendPool {
    pub fn new(health_check: HealthCheck) -> Self {
        Self {
            backends: Vec::new(),
            health_check,
        }
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn address(&self, index: usize) -> Option<&str> {
        self.backends.get(index).map(|b| b.address())
    }

    pub fn addresses(&self) -> Vec<String> {
        self.backends.iter().map(|b| b.address.clone()).collect()
    }

    pub fn position(&self, address: &str) -> Option<usize> {
        self.backends
            .binary_search_by(|b| b.address.as_str().cmp(address))
            .ok()
    }

    /// Replaces the membership, keeping health state for addresses that stay.
    /// Returns whether the membership changed.
    pub fn replace<I>(&mut self, addresses: I) -> bool
    where
        I: IntoIterator<Item = String>,
    {
        let mut addresses: Vec<String> = addresses.into_iter().collect();
        addresses.sort();
        addresses.dedup();

        if addresses.len() == self.backends.len()
            && addresses
                .iter()
                .zip(&self.backends)
                .all(|(a, b)| a == &b.address)
        {
            return false;
        }

        let mut previous: HashMap<String, BackendState> = std::mem::take(&mut self.backends)
            .into_iter()
            .map(|b| (b.address.clone(), b))
            .collect();
        self.backends = addresses
            .into_iter()
            .map(|address| {
                previous
                    .remove(&address)
                    .unwrap_or_else(|| BackendState::new(address))
            })
            .collect();
        true
    }

    pub fn mark_success(&mut self, address: &str) -> Option<HealthTransition> {
        let index = self.position(address)?;
        let health = &self.health_check;
        self.backends[index].record_success(health)
    }

    pub fn mark_failure(&mut self, address: &str) -> Option<HealthTransition> {
        let index = self.position(address)?;
        let health = &self.health_check;
        self.backends[index].record_failure(health)
    }

    pub fn healthy_indices(&self) -> Vec<usize> {
        self.backends
            .iter()
            .enumerate()
            .filter_map(|(idx, backend)| backend.is_healthy().then_some(idx))
            .collect()
    }

    pub fn unhealthy_indices(&self) -> Vec<usize> {
        self.backends
            .iter()
            .enumerate()
            .filter_map(|(idx, backend)| (!backend.is_healthy()).then_some(idx))
            .collect()
    }
}

pub enum LoadBalancing {
    Ordered(Ordered),
    RoundRobin(RoundRobin),
    Random(Random),
}

impl LoadBalancing {
    pub fn from_config(value: &str) -> Result<Self, String> {
        let mode = value.trim().to_lowercase();
        match mode.as_str() {
            "ordered" => Ok(Self::Ordered(Ordered)),
            "round-robin" | "round_robin" | "rr" => Ok(Self::RoundRobin(RoundRobin::new())),
            "random" => Ok(Self::Random(Random::new())),
            _ => Err(format!("unsupported backend ordering strategy: {value}")),
        }
    }

    /// Every backend index, healthy ones first. Unhealthy backends stay at the
    /// tail as a last resort.
    pub fn order(&mut self, pool: &BackendPool) -> Vec<usize> {
        let mut healthy = pool.healthy_indices();
        let mut unhealthy = pool.unhealthy_indices();
        match self {
            LoadBalancing::Ordered(_) => {}
            LoadBalancing::RoundRobin(rr) => rr.rotate(&mut healthy),
            LoadBalancing::Random(rand) => {
                rand.shuffle(&mut healthy);
                rand.shuffle(&mut unhealthy);
            }
        }
        healthy.extend(unhealthy);
        healthy
    }
}

impl Default for LoadBalancing {
    fn default() -> Self {
        Self::RoundRobin(RoundRobin::new())
    }
}

pub struct Ordered;

pub struct RoundRobin {
    next: usize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    fn rotate(&mut self, candidates: &mut [usize]) {
        if candidates.is_empty() {
            return;
        }

        let offset = self.next % candidates.len();
        candidates.rotate_left(offset);
        self.next = self.next.wrapping_add(1);
    }
}

impl Default for RoundRobin {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Random;

impl Random {
    pub fn new() -> Self {
        Self
    }

    fn shuffle(&mut self, candidates: &mut [usize]) {
        candidates.shuffle(&mut rand::thread_rng());
    }
}

impl Default for Random {
    fn default() -> Self {
        Self::new()
    }
}

/// A pool plus the policy that orders it, updated together under one lock.
pub struct BackendSet {
    pool: BackendPool,
    load_balancer: LoadBalancing,
}

impl BackendSet {
    pub fn new(health_check: HealthCheck, load_balancer: LoadBalancing) -> Self {
        Self {
            pool: BackendPool::new(health_check),
            load_balancer,
        }
    }

    pub fn pool(&self) -> &BackendPool {
        &self.pool
    }

    pub fn replace(&mut self, addresses: Vec<String>) -> bool {
        self.pool.replace(addresses)
    }

    /// Backend addresses in dial order, without `exclude`.
    pub fn candidates(&mut self, exclude: &str) -> Vec<String> {
        self.load_balancer
            .order(&self.pool)
            .into_iter()
            .filter_map(|idx| self.pool.address(idx))
            .filter(|address| *address != exclude)
            .map(str::to_string)
            .collect()
    }

    pub fn mark_success(&mut self, address: &str) {
        if let Some(transition) = self.pool.mark_success(address) {
            log_health_transition(address, transition);
        }
    }

    pub fn mark_failure(&mut self, address: &str) {
        if let Some(transition) = self.pool.mark_failure(address) {
            log_health_transition(address, transition);
        }
    }
}

fn log_health_transition(address: &str, transition: HealthTransition) {
    match transition {
        HealthTransition::BecameHealthy => info!("Backend {address} is healthy again"),
        HealthTransition::BecameUnhealthy => warn!("Backend {address} marked unhealthy"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn health(failure_threshold: u32, cooldown_ms: u64) -> HealthCheck {
        HealthCheck {
            failure_threshold,
            success_threshold: 1,
            cooldown_ms,
        }
    }

    fn pool(addresses: &[&str]) -> BackendPool {
        let mut pool = BackendPool::new(health(3, 0));
        pool.replace(addresses.iter().map(|a| a.to_string()));
        pool
    }

    #[test]
    fn replace_sorts_and_dedups() {
        let pool = pool(&["10.0.0.3:6443", "10.0.0.1:6443", "10.0.0.3:6443"]);
        assert_eq!(pool.addresses(), vec!["10.0.0.1:6443", "10.0.0.3:6443"]);
    }

    #[test]
    fn replace_reports_changes_only() {
        let mut pool = pool(&["10.0.0.1:1", "10.0.0.2:1"]);
        assert!(!pool.replace(vec!["10.0.0.2:1".to_string(), "10.0.0.1:1".to_string()]));
        assert!(pool.replace(vec!["10.0.0.2:1".to_string()]));
        assert_eq!(pool.addresses(), vec!["10.0.0.2:1"]);
    }

    #[test]
    fn replace_keeps_health_of_retained_backends() {
        let mut pool = BackendPool::new(health(1, 60_000));
        pool.replace(vec!["10.0.0.1:1".to_string(), "10.0.0.2:1".to_string()]);
        assert_eq!(
            pool.mark_failure("10.0.0.2:1"),
            Some(HealthTransition::BecameUnhealthy)
        );

        pool.replace(vec![
            "10.0.0.2:1".to_string(),
            "10.0.0.3:1".to_string(),
        ]);
        assert_eq!(pool.addresses(), vec!["10.0.0.2:1", "10.0.0.3:1"]);
        assert_eq!(pool.healthy_indices(), vec![1]);
        assert_eq!(pool.unhealthy_indices(), vec![0]);
    }

    #[test]
    fn round_robin_rotates_start() {
        let pool = pool(&["10.0.0.1:1", "10.0.0.2:1", "10.0.0.3:1"]);
        let mut lb = LoadBalancing::from_config("round-robin").unwrap();

        assert_eq!(lb.order(&pool), vec![0, 1, 2]);
        assert_eq!(lb.order(&pool), vec![1, 2, 0]);
        assert_eq!(lb.order(&pool), vec![2, 0, 1]);
        assert_eq!(lb.order(&pool), vec![0, 1, 2]);
    }

    #[test]
    fn ordered_is_stable() {
        let pool = pool(&["10.0.0.2:1", "10.0.0.1:1"]);
        let mut lb = LoadBalancing::from_config("ordered").unwrap();
        assert_eq!(lb.order(&pool), vec![0, 1]);
        assert_eq!(lb.order(&pool), vec![0, 1]);
    }

    #[test]
    fn random_returns_every_backend() {
        let pool = pool(&["10.0.0.1:1", "10.0.0.2:1", "10.0.0.3:1"]);
        let mut lb = LoadBalancing::from_config("random").unwrap();
        let mut order = lb.order(&pool);
        order.sort();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn unhealthy_backends_go_last() {
        let mut pool = pool(&["10.0.0.1:1", "10.0.0.2:1", "10.0.0.3:1"]);
        pool.mark_failure("10.0.0.1:1");
        pool.mark_failure("10.0.0.1:1");
        pool.mark_failure("10.0.0.1:1");

        let mut lb = LoadBalancing::from_config("ordered").unwrap();
        assert_eq!(lb.order(&pool), vec![1, 2, 0]);
    }

    #[test]
    fn load_balancing_from_config() {
        assert!(LoadBalancing::from_config("ordered").is_ok());
        assert!(LoadBalancing::from_config("RR").is_ok());
        assert!(LoadBalancing::from_config("random").is_ok());
        assert!(LoadBalancing::from_config("consistent-hash").is_err());
    }

    #[test]
    fn backend_recovers_after_success_threshold() {
        let mut pool = pool(&["10.0.0.1:1"]);
        pool.mark_failure("10.0.0.1:1");
        pool.mark_failure("10.0.0.1:1");
        assert_eq!(
            pool.mark_failure("10.0.0.1:1"),
            Some(HealthTransition::BecameUnhealthy)
        );

        assert!(pool.healthy_indices().is_empty());
        assert_eq!(
            pool.mark_success("10.0.0.1:1"),
            Some(HealthTransition::BecameHealthy)
        );
        assert_eq!(pool.healthy_indices(), vec![0]);
    }

    #[test]
    fn cooldown_blocks_recovery() {
        let mut pool = BackendPool::new(health(1, 60_000));
        pool.replace(vec!["10.0.0.1:1".to_string()]);
        pool.mark_failure("10.0.0.1:1");

        assert_eq!(pool.mark_success("10.0.0.1:1"), None);
        assert!(pool.healthy_indices().is_empty());
    }

    #[test]
    fn unknown_address_is_ignored() {
        let mut pool = pool(&["10.0.0.1:1"]);
        assert_eq!(pool.mark_failure("10.9.9.9:1"), None);
        assert_eq!(pool.healthy_indices(), vec![0]);
    }

    #[test]
    fn candidates_skip_the_requested_address() {
        let mut set = BackendSet::new(health(1, 0), LoadBalancing::from_config("ordered").unwrap());
        set.replace(vec![
            "10.0.0.1:6443".to_string(),
            "10.0.0.2:6443".to_string(),
        ]);

        assert_eq!(set.candidates("10.0.0.1:6443"), vec!["10.0.0.2:6443"]);
        assert_eq!(
            set.candidates("lb.example:6443"),
            vec!["10.0.0.1:6443", "10.0.0.2:6443"]
        );
    }
}
