use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use governor::clock::{Clock, DefaultClock};
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Per-provider request quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePolicy {
    pub quota_window: Duration,
    pub quota_limit: u32,
}

impl RatePolicy {
    /// CoinMarketCap basic plan: 30 calls per minute.
    pub const fn coinmarketcap_basic() -> Self {
        Self {
            quota_window: Duration::from_secs(60),
            quota_limit: 30,
        }
    }
}

/// Request budget shared by every call an adapter makes.
///
/// Calls over budget are rejected immediately instead of queued; the
/// section shows the slot as pending and the next refresh tries again.
#[derive(Clone)]
pub struct RateBudget {
    limiter: Arc<DirectRateLimiter>,
    clock: DefaultClock,
    /// Earliest instant the limiter admits a call after the last refusal.
    refilled_at: Arc<Mutex<Option<Instant>>>,
}

impl RateBudget {
    pub fn new(policy: RatePolicy) -> Self {
        let clock = DefaultClock::default();
        Self {
            limiter: Arc::new(RateLimiter::direct_with_clock(
                quota_from_policy(policy),
                &clock,
            )),
            clock,
            refilled_at: Arc::new(Mutex::new(None)),
        }
    }

    /// Takes one unit of budget, returning `false` when the quota is spent.
    pub fn try_acquire(&self) -> bool {
        let outcome = self.limiter.check();
        let refilled_at = outcome
            .as_ref()
            .err()
            .map(|not_until| Instant::now() + not_until.wait_time_from(self.clock.now()));
        *self.refilled_at.lock().unwrap_or_else(PoisonError::into_inner) = refilled_at;
        outcome.is_ok()
    }

    /// Whether a call made now would be admitted.
    pub fn available(&self) -> bool {
        self.refilled_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .map_or(true, |refilled_at| Instant::now() >= refilled_at)
    }
}

fn quota_from_policy(policy: RatePolicy) -> Quota {
    let burst = NonZeroU32::new(policy.quota_limit).unwrap_or(NonZeroU32::MIN);

    let seconds_per_cell =
        (policy.quota_window.as_secs_f64() / f64::from(burst.get())).max(0.001);
    let period = Duration::from_secs_f64(seconds_per_cell);

    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst)
}
