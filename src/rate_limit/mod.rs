// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory per-client rate limiting with a sliding-window log.
//!
//! Every admitted request records its admission instant under the client's
//! address. An admission stops counting exactly one window later, so the
//! in-flight count of an address is always the number of admissions in the
//! trailing window. Expired instants are pruned lazily on every check, and a
//! background sweeper drops addresses that have gone quiet.
//!
//! The whole map sits behind one mutex: read, check and record happen as a
//! single critical section.

pub mod middleware;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub use middleware::{rate_limit, RateLimitGuard};

/// Rate limiting configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Admissions allowed per client within one window
    pub max_requests: u32,
    /// Length of the sliding window
    pub window: Duration,
    /// Upper bound on distinct addresses tracked at once
    pub max_tracked_clients: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(60),
            max_tracked_clients: 1000,
        }
    }
}

/// Rate limiting errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateLimitError {
    #[error("there are too many requests, retry in {}s", retry_after.as_secs())]
    TooManyRequests { retry_after: Duration },
    #[error("too many distinct clients are being tracked")]
    CapacityExceeded { retry_after: Duration },
}

impl RateLimitError {
    pub fn retry_after(&self) -> Duration {
        match self {
            RateLimitError::TooManyRequests { retry_after }
            | RateLimitError::CapacityExceeded { retry_after } => *retry_after,
        }
    }
}

/// Process-wide limiter. Build once at startup and share behind an `Arc`.
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Admit or reject one request from `client`. An admitted request is
    /// counted until one window has passed; a rejected one is not counted.
    pub fn check(&self, client: &str) -> Result<(), RateLimitError> {
        let mut windows = self.windows.lock();
        // Read under the lock so each log stays in admission order.
        let now = Instant::now();
        let window = self.config.window;

        if let Some(admissions) = windows.get_mut(client) {
            prune(admissions, now, window);
            if admissions.len() >= self.config.max_requests as usize {
                let retry_after = admissions
                    .front()
                    .map(|oldest| (*oldest + window).saturating_duration_since(now))
                    .unwrap_or(window);
                return Err(RateLimitError::TooManyRequests { retry_after });
            }
            admissions.push_back(now);
            return Ok(());
        }

        if self.config.max_requests == 0 {
            return Err(RateLimitError::TooManyRequests { retry_after: window });
        }

        if windows.len() >= self.config.max_tracked_clients {
            retain_active(&mut windows, now, window);
            if windows.len() >= self.config.max_tracked_clients {
                return Err(RateLimitError::CapacityExceeded { retry_after: window });
            }
        }

        windows.insert(client.to_owned(), VecDeque::from([now]));
        Ok(())
    }

    /// Admissions of `client` still inside the trailing window.
    pub fn in_flight(&self, client: &str) -> usize {
        let now = Instant::now();
        let window = self.config.window;
        self.windows
            .lock()
            .get(client)
            .map(|admissions| {
                admissions
                    .iter()
                    .filter(|admitted| now.duration_since(**admitted) < window)
                    .count()
            })
            .unwrap_or(0)
    }

    /// Number of addresses currently held in the map.
    pub fn tracked_clients(&self) -> usize {
        self.windows.lock().len()
    }

    /// Prune expired admissions everywhere and forget idle addresses.
    pub fn sweep(&self) {
        let mut windows = self.windows.lock();
        let now = Instant::now();
        retain_active(&mut windows, now, self.config.window);
    }

    /// Run [`RateLimiter::sweep`] once per window until `shutdown` fires.
    pub fn spawn_sweeper(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let period = self.config.window;
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::debug!("Rate limit sweeper shutting down");
                        break;
                    }
                    _ = tick.tick() => self.sweep(),
                }
            }
        })
    }
}

/// Drop admissions at least one window old from the front of the log.
fn prune(admissions: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&oldest) = admissions.front() {
        if now.duration_since(oldest) >= window {
            admissions.pop_front();
        } else {
            break;
        }
    }
}

fn retain_active(windows: &mut HashMap<String, VecDeque<Instant>>, now: Instant, window: Duration) {
    windows.retain(|_, admissions| {
        prune(admissions, now, window);
        !admissions.is_empty()
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32, window_secs: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            max_requests,
            window: Duration::from_secs(window_secs),
            max_tracked_clients: 1000,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn third_request_in_window_is_rejected_then_recovers() {
        let limiter = limiter(2, 60);

        assert!(limiter.check("10.0.0.1").is_ok());
        assert!(limiter.check("10.0.0.1").is_ok());
        assert!(matches!(
            limiter.check("10.0.0.1"),
            Err(RateLimitError::TooManyRequests { .. })
        ));
        assert_eq!(limiter.in_flight("10.0.0.1"), 2);

        tokio::time::advance(Duration::from_secs(60)).await;

        assert!(limiter.check("10.0.0.1").is_ok());
        assert_eq!(limiter.in_flight("10.0.0.1"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn each_admission_expires_on_its_own() {
        let limiter = limiter(2, 60);

        limiter.check("client").unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        limiter.check("client").unwrap();

        // First admission leaves the window, the second is still counted.
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(limiter.in_flight("client"), 1);
        assert!(limiter.check("client").is_ok());
        assert!(limiter.check("client").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_points_at_oldest_admission() {
        let limiter = limiter(1, 60);
        limiter.check("client").unwrap();
        tokio::time::advance(Duration::from_secs(20)).await;

        let err = limiter.check("client").unwrap_err();
        assert_eq!(err.retry_after(), Duration::from_secs(40));
    }

    #[test]
    fn rejected_requests_are_not_counted() {
        let limiter = limiter(1, 60);
        limiter.check("client").unwrap();
        for _ in 0..5 {
            assert!(limiter.check("client").is_err());
        }
        assert_eq!(limiter.in_flight("client"), 1);
    }

    #[test]
    fn independent_limits_per_client() {
        let limiter = limiter(1, 60);
        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("a").is_err());
        assert!(limiter.check("b").is_ok());
    }

    #[test]
    fn zero_limit_always_rejects() {
        let limiter = limiter(0, 60);
        assert!(limiter.check("client").is_err());
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn capacity_cap_rejects_new_clients_only() {
        let limiter = RateLimiter::new(RateLimitConfig {
            max_requests: 5,
            window: Duration::from_secs(60),
            max_tracked_clients: 2,
        });
        limiter.check("a").unwrap();
        limiter.check("b").unwrap();

        assert!(matches!(
            limiter.check("c"),
            Err(RateLimitError::CapacityExceeded { .. })
        ));
        // Known clients keep being served.
        assert!(limiter.check("a").is_ok());

        // Once existing windows drain, room frees up.
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(limiter.check("c").is_ok());
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_forgets_idle_clients() {
        let limiter = limiter(10, 60);
        limiter.check("a").unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        limiter.check("b").unwrap();

        tokio::time::advance(Duration::from_secs(30)).await;
        limiter.sweep();
        assert_eq!(limiter.tracked_clients(), 1);
        assert_eq!(limiter.in_flight("a"), 0);
        assert_eq!(limiter.in_flight("b"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_task_runs_until_cancelled() {
        let limiter = Arc::new(limiter(10, 60));
        let shutdown = CancellationToken::new();
        let handle = limiter.clone().spawn_sweeper(shutdown.clone());

        limiter.check("a").unwrap();
        tokio::time::sleep(Duration::from_secs(121)).await;
        assert_eq!(limiter.tracked_clients(), 0);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_checks_never_over_admit() {
        let limiter = Arc::new(limiter(30, 60));
        let mut handles = Vec::with_capacity(100);
        for _ in 0..100 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move { limiter.check("contended").is_ok() }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 30);
        assert_eq!(limiter.in_flight("contended"), 30);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn admission_log_stays_ordered_under_contention() {
        let limiter = Arc::new(limiter(10_000, 60));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..200 {
                    limiter.check("contended").unwrap();
                    tokio::task::yield_now().await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let windows = limiter.windows.lock();
        let log = &windows["contended"];
        assert_eq!(log.len(), 1600);
        assert!(log.iter().zip(log.iter().skip(1)).all(|(a, b)| a <= b));
    }

    #[tokio::test(start_paused = true)]
    async fn count_settles_to_zero_after_window() {
        let limiter = Arc::new(limiter(50, 60));
        let mut handles = Vec::new();
        for i in 0..80 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(i * 10)).await;
                limiter.check("burst").is_ok()
            }));
        }
        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 50);
        assert_eq!(limiter.in_flight("burst"), 50);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(limiter.in_flight("burst"), 0);
        limiter.sweep();
        assert_eq!(limiter.tracked_clients(), 0);
    }
}
