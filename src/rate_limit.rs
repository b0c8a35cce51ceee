use crate::error::{Result, ScraperError};
use governor::{
    Quota, RateLimiter,
    clock::{Clock, DefaultClock},
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
};
use std::num::NonZeroU32;

/// Caller-imposed request budget.
///
/// The whole per-minute budget may be spent in a burst and cells come back
/// one at a time across the minute. An exhausted budget is reported at once,
/// never waited out.
pub struct RequestBudget<C: Clock = DefaultClock> {
    limiter: RateLimiter<NotKeyed, InMemoryState, C, NoOpMiddleware<C::Instant>>,
}

impl RequestBudget {
    pub fn per_minute(requests: u32) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN));
        Self {
            limiter: RateLimiter::direct(quota),
        }
    }
}

impl<C: Clock> RequestBudget<C> {
    /// Takes one cell or reports how long until one is available.
    pub fn try_acquire(&self) -> Result<()> {
        self.limiter.check().map_err(|not_until| ScraperError::RateLimited {
            retry_after: not_until.wait_time_from(self.limiter.clock().now()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use governor::clock::FakeRelativeClock;
    use std::time::Duration;

    fn fake_budget(requests: u32) -> RequestBudget<FakeRelativeClock> {
        let quota = Quota::per_minute(NonZeroU32::new(requests).unwrap());
        RequestBudget {
            limiter: RateLimiter::direct_with_clock(quota, FakeRelativeClock::default()),
        }
    }

    #[test]
    fn budget_refills_over_time() {
        let budget = fake_budget(2);

        assert!(budget.try_acquire().is_ok());
        assert!(budget.try_acquire().is_ok());

        match budget.try_acquire() {
            Err(ScraperError::RateLimited { retry_after }) => {
                assert!(retry_after <= Duration::from_secs(30));
                assert!(retry_after > Duration::from_secs(29));
            }
            other => panic!("expected RateLimited, got {:?}", other),
        }

        budget.limiter.clock().advance(Duration::from_secs(31));
        assert!(budget.try_acquire().is_ok());
    }

    #[test]
    fn refill_never_exceeds_capacity() {
        let budget = fake_budget(3);
        budget.limiter.clock().advance(Duration::from_secs(600));

        for _ in 0..3 {
            assert!(budget.try_acquire().is_ok());
        }
        assert!(budget.try_acquire().is_err());
    }

    #[test]
    fn zero_budget_still_allows_one_request() {
        let budget = RequestBudget::per_minute(0);
        assert!(budget.try_acquire().is_ok());
        assert!(matches!(
            budget.try_acquire(),
            Err(ScraperError::RateLimited { .. })
        ));
    }
}
