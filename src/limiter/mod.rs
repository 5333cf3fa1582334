//! Per-client token bucket limiter.
//!
//! Each client key owns a `governor` GCRA limiter admitting up to `burst`
//! requests at once and replenishing at `rps` per second. New clients start
//! with the full burst; a rejected request reports the time until the next
//! cell becomes available.
//!
//! Clients that have not been seen for `idle_timeout` are evicted by
//! [`RateLimiter::sweep`], which [`RateLimiter::spawn_sweeper`] runs on a
//! fixed interval until shutdown is signalled.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use governor::clock::{Clock, DefaultClock, Reference};
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::Quota;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::LimiterConfig;

/// Slowest replenish period; lower rates are clamped to one cell per day
const MAX_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

type ClientLimiter<C> =
    governor::RateLimiter<NotKeyed, InMemoryState, C, NoOpMiddleware<<C as Clock>::Instant>>;

/// Outcome of spending a token
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Admission {
    Allowed,
    Rejected { retry_after: Duration },
}

struct Entry<C: Clock> {
    limiter: ClientLimiter<C>,
    last_seen: C::Instant,
}

pub struct RateLimiter<C: Clock = DefaultClock> {
    quota: Quota,
    sweep_interval: Duration,
    idle_timeout: Duration,
    clock: C,
    clients: Mutex<HashMap<String, Entry<C>>>,
}

/// `rps` per second with a `burst` capacity; non-finite or non-positive
/// rates fall back to the slowest period
pub fn quota(config: &LimiterConfig) -> Quota {
    let burst = NonZeroU32::new(config.burst).unwrap_or(NonZeroU32::MIN);
    let period = Duration::try_from_secs_f64(1.0 / config.rps)
        .map(|period| period.min(MAX_PERIOD))
        .unwrap_or(MAX_PERIOD);

    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX))
        .allow_burst(burst)
}

impl RateLimiter<DefaultClock> {
    pub fn new(config: &LimiterConfig) -> Self {
        Self::with_clock(config, DefaultClock::default())
    }
}

impl<C: Clock> RateLimiter<C> {
    pub fn with_clock(config: &LimiterConfig, clock: C) -> Self {
        Self {
            quota: quota(config),
            sweep_interval: config.sweep_interval,
            idle_timeout: config.idle_timeout,
            clock,
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn clients(&self) -> MutexGuard<'_, HashMap<String, Entry<C>>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spend one token from `key`'s bucket
    pub fn check(&self, key: &str) -> Admission {
        let now = self.clock.now();
        let mut clients = self.clients();

        let entry = clients.entry(key.to_string()).or_insert_with(|| Entry {
            limiter: governor::RateLimiter::direct_with_clock(self.quota, &self.clock),
            last_seen: now,
        });
        entry.last_seen = now;

        match entry.limiter.check() {
            Ok(()) => Admission::Allowed,
            Err(not_until) => Admission::Rejected {
                retry_after: not_until.wait_time_from(now),
            },
        }
    }

    pub fn allow(&self, key: &str) -> bool {
        matches!(self.check(key), Admission::Allowed)
    }

    /// Evict clients idle for longer than the idle timeout; returns how many
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut clients = self.clients();
        let before = clients.len();
        clients.retain(|_, entry| {
            Duration::from(now.duration_since(entry.last_seen)) <= self.idle_timeout
        });
        before - clients.len()
    }

    /// Number of tracked clients
    pub fn len(&self) -> usize {
        self.clients().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<C> RateLimiter<C>
where
    C: Clock + Send + Sync + 'static,
    C::Instant: Send + Sync,
{
    /// Run [`sweep`](Self::sweep) every sweep interval until `shutdown`
    /// flips to true or its sender is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(limiter.sweep_interval);
            // first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let evicted = limiter.sweep();
                        if evicted > 0 {
                            debug!(evicted, remaining = limiter.len(), "rate limiter sweep");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            debug!("rate limiter sweeper stopped");
                            break;
                        }
                    }
                }
            }
        })
    }
}
