//! Request rate limiting for GeoJSON endpoints.
//!
//! Anonymous and authenticated callers get independent per-minute ceilings
//! to protect the compute-heavy cache-miss path from crawler overload.
//! Fixed one-minute windows per caller key; state is process-local, which is
//! sufficient because the limit guards computation cost, not global quota.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const WINDOW: Duration = Duration::from_secs(60);

// Stale windows are swept once the map grows past this many callers.
const SWEEP_THRESHOLD: usize = 10_000;

/// Caller class determining which ceiling applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerClass {
    Anonymous,
    Authenticated,
}

struct WindowState {
    started: Instant,
    count: u32,
}

/// Fixed-window rate limiter keyed by caller identity.
pub struct RateLimiter {
    windows: Mutex<HashMap<String, WindowState>>,
    anon_limit: u32,
    user_limit: u32,
}

impl RateLimiter {
    /// Create a limiter with per-minute ceilings for each caller class.
    pub fn new(anon_limit: u32, user_limit: u32) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            anon_limit,
            user_limit,
        }
    }

    /// Record a request and return whether it is allowed.
    ///
    /// `client_key` identifies the caller within its class (client address
    /// for anonymous callers, credential for authenticated ones); the two
    /// classes never share windows.
    pub async fn check(&self, class: CallerClass, client_key: &str) -> bool {
        let (prefix, limit) = match class {
            CallerClass::Anonymous => ("anon", self.anon_limit),
            CallerClass::Authenticated => ("user", self.user_limit),
        };
        let key = format!("{}:{}", prefix, client_key);

        let mut windows = self.windows.lock().await;

        if windows.len() > SWEEP_THRESHOLD {
            windows.retain(|_, w| w.started.elapsed() < WINDOW);
        }

        let entry = windows.entry(key).or_insert_with(|| WindowState {
            started: Instant::now(),
            count: 0,
        });

        if entry.started.elapsed() >= WINDOW {
            entry.started = Instant::now();
            entry.count = 0;
        }

        if entry.count >= limit {
            false
        } else {
            entry.count += 1;
            true
        }
    }
}
