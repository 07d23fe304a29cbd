//! Per-channel request budget enforcement.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use super::ledger::{RequestLedger, LEDGER_WINDOW};
use crate::config::RateLimitPolicy;
use crate::models::Channel;

/// Re-check interval while over the per-minute or burst budget.
pub const RECHECK_INTERVAL: Duration = Duration::from_secs(1);

const MINUTE: Duration = Duration::from_secs(60);
const SECOND: Duration = Duration::from_secs(1);

/// Outcome of checking the ledger against the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Ready,
    Wait(Duration),
}

/// Request counts over the limiter's windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStats {
    pub last_second: usize,
    pub last_minute: usize,
    pub last_hour: usize,
}

/// Rate limiter owning one channel's request history.
///
/// `admit` never rejects: callers over budget are delayed until the budget
/// allows them through.
#[derive(Debug)]
pub struct RateLimiter {
    channel: Channel,
    policy: RateLimitPolicy,
    ledger: Mutex<RequestLedger>,
}

impl RateLimiter {
    pub fn new(channel: Channel, policy: RateLimitPolicy) -> Self {
        // Nothing beyond max_per_hour can be admitted within the window, so
        // that is all the history the ledger ever needs.
        let capacity = policy.max_per_hour.max(1) as usize;
        Self {
            channel,
            policy,
            ledger: Mutex::new(RequestLedger::with_capacity(capacity)),
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Wait until the channel is within budget, then record the request.
    pub async fn admit(&self, url: &str) {
        loop {
            let wait = {
                let mut ledger = self.ledger.lock().await;
                let now = Instant::now();
                ledger.prune(now, LEDGER_WINDOW);
                match self.check(&ledger, now) {
                    Admission::Ready => {
                        ledger.push(now, url);
                        return;
                    }
                    Admission::Wait(wait) => wait,
                }
            };

            debug!("Rate limiting {}: waiting {:?}", self.channel, wait);
            tokio::time::sleep(wait).await;
        }
    }

    fn check(&self, ledger: &RequestLedger, now: Instant) -> Admission {
        if ledger.len() >= self.policy.max_per_hour as usize {
            // Wait exactly until the oldest entry leaves the hour window.
            let wait = ledger
                .oldest()
                .map(|oldest| (oldest.timestamp + LEDGER_WINDOW).saturating_duration_since(now))
                .unwrap_or(RECHECK_INTERVAL);
            return Admission::Wait(wait.max(Duration::from_millis(1)));
        }

        let per_minute = ledger.count_within(now, MINUTE);
        let per_second = ledger.count_within(now, SECOND);
        if per_minute >= self.policy.requests_per_minute as usize
            || per_second >= self.policy.burst_limit as usize
        {
            return Admission::Wait(RECHECK_INTERVAL);
        }

        Admission::Ready
    }

    /// Current request counts, after pruning expired history.
    pub async fn stats(&self) -> RateLimitStats {
        let mut ledger = self.ledger.lock().await;
        let now = Instant::now();
        ledger.prune(now, LEDGER_WINDOW);
        RateLimitStats {
            last_second: ledger.count_within(now, SECOND),
            last_minute: ledger.count_within(now, MINUTE),
            last_hour: ledger.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(requests_per_minute: u32, burst_limit: u32, max_per_hour: u32) -> RateLimiter {
        RateLimiter::new(
            Channel::Airbnb,
            RateLimitPolicy {
                requests_per_minute,
                burst_limit,
                max_per_hour,
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn third_admit_waits_for_minute_window() {
        let limiter = limiter(2, 10, 100);
        let start = Instant::now();

        limiter.admit("https://example.com/1").await;
        limiter.admit("https://example.com/2").await;
        assert!(start.elapsed() < Duration::from_secs(1));

        limiter.admit("https://example.com/3").await;
        assert!(start.elapsed() >= Duration::from_secs(60));
        assert!(start.elapsed() < Duration::from_secs(62));
    }

    #[tokio::test(start_paused = true)]
    async fn burst_limit_spaces_requests() {
        let limiter = limiter(100, 1, 100);
        let start = Instant::now();

        limiter.admit("https://example.com/a").await;
        limiter.admit("https://example.com/b").await;
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn hourly_cap_waits_until_oldest_expires() {
        let limiter = limiter(100, 100, 2);
        let start = Instant::now();

        limiter.admit("https://example.com/1").await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        limiter.admit("https://example.com/2").await;

        limiter.admit("https://example.com/3").await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3600));
        assert!(elapsed < Duration::from_secs(3601));
    }

    #[tokio::test(start_paused = true)]
    async fn stats_reflect_windows() {
        let limiter = limiter(100, 100, 100);
        limiter.admit("https://example.com/1").await;
        tokio::time::sleep(Duration::from_secs(30)).await;
        limiter.admit("https://example.com/2").await;

        let stats = limiter.stats().await;
        assert_eq!(stats.last_second, 1);
        assert_eq!(stats.last_minute, 2);
        assert_eq!(stats.last_hour, 2);

        tokio::time::sleep(Duration::from_secs(3600)).await;
        let stats = limiter.stats().await;
        assert_eq!(stats.last_hour, 0);
    }
}
