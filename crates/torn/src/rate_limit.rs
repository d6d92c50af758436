//! Sliding-window request limiting and API key rotation.
//!
//! Upstream allows roughly 100 requests per minute per key. [`RateLimiter`]
//! caps the whole process below that, and [`KeyRing`] spreads requests over
//! every configured key by always picking the least-used one.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Default process-wide request budget per window.
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 90;

/// Window length used for both the limiter and key usage tracking.
pub const WINDOW: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// RateLimiter
// ---------------------------------------------------------------------------

/// Sliding-window limiter.
///
/// [`acquire`](Self::acquire) waits for a free slot instead of failing, so
/// callers never see a rate-limit error from this side of the wire.
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            calls: Mutex::new(VecDeque::new()),
        }
    }

    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests, WINDOW)
    }

    /// Wait until a slot is free, then record a request.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut calls = self.calls.lock().await;
                let now = Instant::now();
                prune(&mut calls, now, self.window);
                if calls.len() < self.max_requests as usize {
                    calls.push_back(now);
                    return;
                }
                time_until_free(&calls, now, self.window)
            };
            tracing::debug!(wait_ms = wait.as_millis() as u64, "Rate limit reached, waiting");
            tokio::time::sleep(wait).await;
        }
    }

    /// Requests still available in the current window.
    pub async fn requests_remaining(&self) -> u32 {
        let mut calls = self.calls.lock().await;
        prune(&mut calls, Instant::now(), self.window);
        self.max_requests.saturating_sub(calls.len() as u32)
    }

    /// How long until the next request can be made (zero if one is free now).
    pub async fn wait_time(&self) -> Duration {
        let mut calls = self.calls.lock().await;
        let now = Instant::now();
        prune(&mut calls, now, self.window);
        if calls.len() < self.max_requests as usize {
            Duration::ZERO
        } else {
            time_until_free(&calls, now, self.window)
        }
    }
}

fn prune(calls: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while calls
        .front()
        .is_some_and(|t| now.duration_since(*t) >= window)
    {
        calls.pop_front();
    }
}

fn time_until_free(calls: &VecDeque<Instant>, now: Instant, window: Duration) -> Duration {
    calls
        .front()
        .map(|oldest| (*oldest + window).saturating_duration_since(now))
        .unwrap_or(Duration::ZERO)
}

// ---------------------------------------------------------------------------
// KeyRing
// ---------------------------------------------------------------------------

/// Set of upstream API keys with per-key usage tracking.
pub struct KeyRing {
    keys: Vec<String>,
    usage: Mutex<Vec<VecDeque<Instant>>>,
}

impl KeyRing {
    /// Build a ring from raw keys, dropping blanks and duplicates.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut unique: Vec<String> = Vec::new();
        for key in keys {
            let key = key.as_ref().trim();
            if !key.is_empty() && !unique.iter().any(|k| k == key) {
                unique.push(key.to_string());
            }
        }
        let usage = vec![VecDeque::new(); unique.len()];
        Self {
            keys: unique,
            usage: Mutex::new(usage),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Pick the key with the fewest requests in the last minute and record
    /// a use of it. Ties go to the key listed first.
    pub async fn next_key(&self) -> Option<String> {
        let mut usage = self.usage.lock().await;
        let now = Instant::now();
        for calls in usage.iter_mut() {
            prune(calls, now, WINDOW);
        }
        let (index, calls) = usage
            .iter_mut()
            .enumerate()
            .min_by_key(|(i, calls)| (calls.len(), *i))?;
        calls.push_back(now);
        Some(self.keys[index].clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
