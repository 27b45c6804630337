//! Rate limiting implementation
//!
//! A token bucket with continuous (fractional) refill. Callers that find the
//! bucket empty are queued FIFO; each queued caller gets its own timer task
//! scheduled for the instant its token will exist, so a burst of waiters is
//! granted at staggered instants instead of one window apart.
//!
//! The waiter queue doubles as an arena of timer handles: [`RateLimiter::reset`]
//! aborts every timer and drops every grant channel in one pass.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, trace};

/// Configuration for rate limiting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RateLimiterConfig {
    /// Bucket capacity: requests allowed per window
    pub max_requests: u32,
    /// Length of the window over which the bucket fully refills
    #[serde(rename = "windowMs", with = "crate::serde_millis")]
    pub window: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(1),
        }
    }
}

impl RateLimiterConfig {
    /// Create a new rate limiter config
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    /// `n` requests per second
    pub fn per_second(n: u32) -> Self {
        Self::new(n, Duration::from_secs(1))
    }

    /// `n` requests per minute
    pub fn per_minute(n: u32) -> Self {
        Self::new(n, Duration::from_secs(60))
    }

    /// Reject configs the bucket cannot refill with
    pub fn validate(&self) -> Result<()> {
        if self.max_requests == 0 {
            return Err(Error::config("rateLimit.maxRequests must be greater than zero"));
        }
        if self.window.is_zero() {
            return Err(Error::config("rateLimit.windowMs must be greater than zero"));
        }
        Ok(())
    }
}

/// Point-in-time view of a limiter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimiterStats {
    /// Whole tokens available right now
    pub available_tokens: u32,
    pub capacity: u32,
    /// Callers currently suspended in [`RateLimiter::acquire`]
    pub queue_length: usize,
    pub total_granted: u64,
    pub average_wait: Duration,
    pub max_wait: Duration,
    /// Failed [`RateLimiter::try_acquire`] calls
    pub rejected: u64,
    /// Share of the bucket in use, 0-100
    pub utilization: f64,
}

struct Waiter {
    id: u64,
    enqueued_at: Instant,
    grant: oneshot::Sender<()>,
    timer: JoinHandle<()>,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
    waiters: VecDeque<Waiter>,
    next_waiter_id: u64,
    total_granted: u64,
    total_wait: Duration,
    max_wait: Duration,
    rejected: u64,
}

impl BucketState {
    fn full(capacity: u32, now: Instant) -> Self {
        Self {
            tokens: f64::from(capacity),
            last_refill: now,
            waiters: VecDeque::new(),
            next_waiter_id: 0,
            total_granted: 0,
            total_wait: Duration::ZERO,
            max_wait: Duration::ZERO,
            rejected: 0,
        }
    }

    fn record_grant(&mut self, waited: Duration) {
        self.tokens -= 1.0;
        self.total_granted += 1;
        self.total_wait += waited;
        self.max_wait = self.max_wait.max(waited);
    }
}

struct Shared {
    capacity: u32,
    window: Duration,
    state: Mutex<BucketState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, BucketState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn window_ms(&self) -> f64 {
        self.window.as_nanos() as f64 / 1_000_000.0
    }

    /// Add `elapsed * capacity / window` tokens, capped at capacity
    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed_ms =
            now.saturating_duration_since(state.last_refill).as_nanos() as f64 / 1_000_000.0;
        if elapsed_ms > 0.0 {
            let added = elapsed_ms * f64::from(self.capacity) / self.window_ms();
            state.tokens = (state.tokens + added).min(f64::from(self.capacity));
            state.last_refill = now;
        }
    }

    /// Time until the waiter at `position` can have its token, assuming every
    /// waiter ahead of it takes one first
    fn wait_for_position(&self, state: &BucketState, position: usize) -> Duration {
        let deficit = (position as f64 + 1.0) - state.tokens;
        if deficit <= 0.0 {
            return Duration::ZERO;
        }
        let wait_ms = (deficit * self.window_ms() / f64::from(self.capacity)).ceil();
        Duration::from_millis(wait_ms as u64)
    }

    /// Hand tokens to queued waiters in FIFO order while whole tokens remain
    fn grant_ready(&self, state: &mut BucketState, now: Instant, current: u64) {
        while state.tokens >= 1.0 {
            let Some(waiter) = state.waiters.pop_front() else {
                break;
            };
            if waiter.id != current {
                waiter.timer.abort();
            }
            if waiter.grant.send(()).is_ok() {
                let waited = now.saturating_duration_since(waiter.enqueued_at);
                state.record_grant(waited);
                trace!(waiter = waiter.id, waited_ms = waited.as_millis() as u64, "token granted");
            } else {
                trace!(waiter = waiter.id, "waiter gone before its grant, token kept");
            }
        }
    }
}

/// Fire at `deadline`, grant whatever is due, and reschedule while this
/// waiter is still queued
async fn run_waiter_timer(shared: Arc<Shared>, id: u64, mut deadline: Instant) {
    loop {
        sleep_until(deadline).await;

        let mut state = shared.lock();
        let now = Instant::now();
        shared.refill(&mut state, now);
        shared.grant_ready(&mut state, now, id);

        match state.waiters.iter().position(|w| w.id == id) {
            Some(position) => deadline = now + shared.wait_for_position(&state, position),
            None => return,
        }
    }
}

/// Token bucket rate limiter
///
/// Cloning is cheap; clones share one bucket.
#[derive(Clone)]
pub struct RateLimiter {
    shared: Arc<Shared>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given config.
    ///
    /// The bucket starts full. Zero values are clamped to 1 request / 1 ms;
    /// [`RateLimiterConfig::validate`] rejects them up front.
    pub fn new(config: &RateLimiterConfig) -> Self {
        let capacity = config.max_requests.max(1);
        let window = config.window.max(Duration::from_millis(1));
        Self {
            shared: Arc::new(Shared {
                capacity,
                window,
                state: Mutex::new(BucketState::full(capacity, Instant::now())),
            }),
        }
    }

    /// Suspend until one token is committed to the caller.
    ///
    /// Returns [`Error::Cancelled`] if [`RateLimiter::reset`] runs while the
    /// caller is queued. Dropping the future gives up the place in the queue
    /// without consuming a token.
    pub async fn acquire(&self) -> Result<()> {
        let granted = {
            let mut state = self.shared.lock();
            let now = Instant::now();
            self.shared.refill(&mut state, now);

            if state.waiters.is_empty() && state.tokens >= 1.0 {
                state.record_grant(Duration::ZERO);
                return Ok(());
            }

            let position = state.waiters.len();
            let wait = self.shared.wait_for_position(&state, position);
            let id = state.next_waiter_id;
            state.next_waiter_id += 1;

            let (grant, granted) = oneshot::channel();
            let timer = tokio::spawn(run_waiter_timer(Arc::clone(&self.shared), id, now + wait));
            state.waiters.push_back(Waiter {
                id,
                enqueued_at: now,
                grant,
                timer,
            });
            debug!(
                waiter = id,
                queue_length = position + 1,
                wait_ms = wait.as_millis() as u64,
                "no token available, queueing"
            );
            granted
        };

        granted
            .await
            .map_err(|_| Error::cancelled("rate limiter was reset while waiting for a token"))
    }

    /// Take a token if one is available right now.
    ///
    /// Never jumps ahead of queued [`RateLimiter::acquire`] callers.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.shared.lock();
        self.shared.refill(&mut state, Instant::now());

        if state.waiters.is_empty() && state.tokens >= 1.0 {
            state.record_grant(Duration::ZERO);
            true
        } else {
            state.rejected += 1;
            false
        }
    }

    /// Cancel every queued waiter, refill the bucket and clear statistics
    pub fn reset(&self) {
        let mut state = self.shared.lock();
        let waiters = std::mem::take(&mut state.waiters);
        let cancelled = waiters.len();
        for waiter in waiters {
            waiter.timer.abort();
        }

        let next_waiter_id = state.next_waiter_id;
        *state = BucketState::full(self.shared.capacity, Instant::now());
        state.next_waiter_id = next_waiter_id;
        debug!(cancelled, "rate limiter reset");
    }

    /// Snapshot of the bucket; refills first so `available_tokens` is current
    pub fn stats(&self) -> RateLimiterStats {
        let mut state = self.shared.lock();
        self.shared.refill(&mut state, Instant::now());

        let capacity = f64::from(self.shared.capacity);
        let average_wait = if state.total_granted == 0 {
            Duration::ZERO
        } else {
            let nanos = state.total_wait.as_nanos() / u128::from(state.total_granted);
            Duration::from_nanos(nanos as u64)
        };

        RateLimiterStats {
            available_tokens: state.tokens.floor().max(0.0) as u32,
            capacity: self.shared.capacity,
            queue_length: state.waiters.len(),
            total_granted: state.total_granted,
            average_wait,
            max_wait: state.max_wait,
            rejected: state.rejected,
            utilization: ((capacity - state.tokens) / capacity * 100.0).clamp(0.0, 100.0),
        }
    }

    /// `true` when a caller arriving now would have to wait
    pub fn is_throttling(&self) -> bool {
        let mut state = self.shared.lock();
        self.shared.refill(&mut state, Instant::now());
        state.tokens < 1.0 || !state.waiters.is_empty()
    }

    /// Time left until one window has passed since the last refill check
    pub fn time_until_refill(&self) -> Duration {
        let state = self.shared.lock();
        let elapsed = Instant::now().saturating_duration_since(state.last_refill);
        self.shared.window.saturating_sub(elapsed)
    }

    pub fn capacity(&self) -> u32 {
        self.shared.capacity
    }

    pub fn window(&self) -> Duration {
        self.shared.window
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(&RateLimiterConfig::default())
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("capacity", &self.shared.capacity)
            .field("window", &self.shared.window)
            .finish_non_exhaustive()
    }
}
