//! Fixed-window rate limiting for the generation backend.
//!
//! Each key owns at most one window. Windows rotate lazily: the first access
//! after `window_end` starts a fresh window, so correctness never depends on
//! the background cleanup running. The cleanup only bounds memory for keys
//! that stop being used.
//!
//! Limiter failures never block a caller. If the [`WindowStore`] errors,
//! [`RateLimiter::check_limit`] logs and allows the request.
//!
//! ```rust
//! use std::time::Duration;
//! use pagegen_core::RateLimiter;
//!
//! let limiter = RateLimiter::new(Duration::from_secs(1), 3);
//! let allowed: Vec<bool> = (0..4).map(|_| limiter.check_limit("k").allowed).collect();
//! assert_eq!(allowed, vec![true, true, true, false]);
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::RateLimitSettings;
use crate::{Error, Result};

/// Counter state of one key's current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateWindow {
    pub count: u32,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

/// Outcome of a [`RateLimiter::check_limit`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
    /// Whole seconds until the window closes, set only when denied
    pub retry_after_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateStatus {
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
    pub total_requests: u32,
}

/// Storage for rate windows.
///
/// `update` must apply the closure atomically per key: two concurrent callers
/// must never both observe the same prior window.
pub trait WindowStore: Send + Sync {
    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<RateWindow>) -> RateWindow,
    ) -> Result<RateWindow>;

    fn get(&self, key: &str) -> Result<Option<RateWindow>>;

    fn remove(&self, key: &str) -> Result<bool>;

    /// Keep only windows for which `keep` returns true; returns how many were dropped.
    fn retain(&self, keep: &dyn Fn(&RateWindow) -> bool) -> Result<usize>;

    fn snapshot(&self) -> Result<Vec<(String, RateWindow)>>;
}

/// Sharded in-process window store.
///
/// The entry API holds the key's shard lock for the whole read-modify-write.
#[derive(Debug, Default)]
pub struct MemoryWindowStore {
    windows: DashMap<String, RateWindow>,
}

impl MemoryWindowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WindowStore for MemoryWindowStore {
    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<RateWindow>) -> RateWindow,
    ) -> Result<RateWindow> {
        match self.windows.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let next = apply(Some(*occupied.get()));
                *occupied.get_mut() = next;
                Ok(next)
            },
            Entry::Vacant(vacant) => {
                let next = apply(None);
                vacant.insert(next);
                Ok(next)
            },
        }
    }

    fn get(&self, key: &str) -> Result<Option<RateWindow>> {
        Ok(self.windows.get(key).map(|w| *w))
    }

    fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.windows.remove(key).is_some())
    }

    fn retain(&self, keep: &dyn Fn(&RateWindow) -> bool) -> Result<usize> {
        let before = self.windows.len();
        self.windows.retain(|_, window| keep(window));
        Ok(before.saturating_sub(self.windows.len()))
    }

    fn snapshot(&self) -> Result<Vec<(String, RateWindow)>> {
        Ok(self
            .windows
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect())
    }
}

/// Fixed-window request counter keyed by caller identity.
pub struct RateLimiter {
    store: Arc<dyn WindowStore>,
    window: Duration,
    max_requests: u32,
    cleanup_task: Mutex<Option<JoinHandle<()>>>,
}

impl RateLimiter {
    /// Limiter over an in-memory store.
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self::with_store(Arc::new(MemoryWindowStore::new()), window, max_requests)
    }

    pub fn with_store(store: Arc<dyn WindowStore>, window: Duration, max_requests: u32) -> Self {
        Self {
            store,
            window,
            max_requests,
            cleanup_task: Mutex::new(None),
        }
    }

    pub fn from_settings(settings: &RateLimitSettings) -> Self {
        Self::new(settings.window(), settings.max_requests)
    }

    pub const fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Count one request against `key` and decide whether it may proceed.
    pub fn check_limit(&self, key: &str) -> RateDecision {
        let now = Utc::now();
        match self.try_check(key, now) {
            Ok(decision) => {
                if !decision.allowed {
                    debug!(key, retry_after = ?decision.retry_after_secs, "rate limit reached");
                }
                decision
            },
            Err(e) => {
                warn!(key, error = %e, "rate limiter unavailable, allowing request");
                RateDecision {
                    allowed: true,
                    remaining: self.max_requests.saturating_sub(1),
                    reset_at: now + self.window_delta(),
                    retry_after_secs: None,
                }
            },
        }
    }

    fn try_check(&self, key: &str, now: DateTime<Utc>) -> Result<RateDecision> {
        let window = self.window_delta();
        let max = self.max_requests;
        let mut decision = None;

        self.store.update(key, &mut |current| {
            let (next, outcome) = step(current, now, window, max);
            decision = Some(outcome);
            next
        })?;

        decision.ok_or_else(|| Error::Other("window store skipped the update".into()))
    }

    fn window_delta(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.window)
            .unwrap_or_else(|_| chrono::Duration::seconds(i64::from(u32::MAX)))
    }

    /// Drop a key's window so its next request starts a fresh one.
    pub fn reset(&self, key: &str) {
        if let Err(e) = self.store.remove(key) {
            warn!(key, error = %e, "failed to reset rate window");
        }
    }

    /// Current state of a key's window, `None` when absent or already closed.
    pub fn status(&self, key: &str) -> Option<RateStatus> {
        let window = self.store.get(key).ok().flatten()?;
        if Utc::now() > window.window_end {
            return None;
        }
        Some(RateStatus {
            remaining: self.max_requests.saturating_sub(window.count),
            reset_at: window.window_end,
            total_requests: window.count,
        })
    }

    /// Snapshot of every stored window.
    pub fn entries(&self) -> Vec<(String, RateWindow)> {
        self.store.snapshot().unwrap_or_else(|e| {
            warn!(error = %e, "failed to list rate windows");
            Vec::new()
        })
    }

    /// Remove windows that have closed. Returns the number removed.
    pub fn cleanup_expired(&self) -> usize {
        cleanup_store(self.store.as_ref(), Utc::now())
    }

    /// Start the periodic hygiene sweep. A running sweep is replaced.
    pub fn spawn_cleanup(&self, every: Duration) {
        let store = Arc::clone(&self.store);
        let handle = tokio::spawn(async move {
            let mut timer = tokio::time::interval(every);
            timer.tick().await;
            loop {
                timer.tick().await;
                cleanup_store(store.as_ref(), Utc::now());
            }
        });

        let mut guard = self
            .cleanup_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = guard.replace(handle) {
            previous.abort();
        }
    }

    /// Stop the background sweep, if any.
    pub fn shutdown(&self) {
        let mut guard = self
            .cleanup_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = guard.take() {
            handle.abort();
        }
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn cleanup_store(store: &dyn WindowStore, now: DateTime<Utc>) -> usize {
    match store.retain(&|window| now <= window.window_end) {
        Ok(removed) => {
            if removed > 0 {
                debug!("Cleaned up {} closed rate windows", removed);
            }
            removed
        },
        Err(e) => {
            warn!(error = %e, "rate window cleanup failed");
            0
        },
    }
}

/// One fixed-window transition.
fn step(
    current: Option<RateWindow>,
    now: DateTime<Utc>,
    window: chrono::Duration,
    max: u32,
) -> (RateWindow, RateDecision) {
    match current {
        Some(existing) if now <= existing.window_end => {
            if existing.count >= max {
                let wait_ms = (existing.window_end - now).num_milliseconds().max(0);
                let retry_after = u64::try_from(wait_ms).unwrap_or(0).div_ceil(1000).max(1);
                (
                    existing,
                    RateDecision {
                        allowed: false,
                        remaining: 0,
                        reset_at: existing.window_end,
                        retry_after_secs: Some(retry_after),
                    },
                )
            } else {
                let next = RateWindow {
                    count: existing.count + 1,
                    ..existing
                };
                (
                    next,
                    RateDecision {
                        allowed: true,
                        remaining: max.saturating_sub(next.count),
                        reset_at: next.window_end,
                        retry_after_secs: None,
                    },
                )
            }
        },
        _ => {
            let fresh = RateWindow {
                count: 1,
                window_start: now,
                window_end: now + window,
            };
            (
                fresh,
                RateDecision {
                    allowed: true,
                    remaining: max.saturating_sub(1),
                    reset_at: fresh.window_end,
                    retry_after_secs: None,
                },
            )
        },
    }
}
