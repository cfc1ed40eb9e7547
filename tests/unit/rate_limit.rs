//! Unit tests for the rate limiter backoff

use chrono::Utc;
use std::time::Duration;
use tokio::time::Instant;
use repo_harvester::harvester::{RateLimitWindow, RateLimiter};

#[tokio::test(start_paused = true)]
async fn test_exhausted_window_blocks_until_reset() {
    let limiter = RateLimiter::new();
    limiter.set_window(Some(RateLimitWindow {
        remaining: 0,
        reset_at: Utc::now() + chrono::Duration::seconds(5),
    }));

    let start = Instant::now();
    let slept = limiter.check_and_wait().await;
    let elapsed = start.elapsed();

    assert!(elapsed >= Duration::from_secs(5), "returned after {elapsed:?}");
    assert!(elapsed <= Duration::from_secs(6), "returned after {elapsed:?}");
    assert!(slept >= Duration::from_secs(5));
    // Budget replenished after the wait
    assert!(limiter.window().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_remaining_budget_does_not_block() {
    let limiter = RateLimiter::new();
    limiter.set_window(Some(RateLimitWindow {
        remaining: 1,
        reset_at: Utc::now() + chrono::Duration::seconds(3600),
    }));

    let start = Instant::now();
    assert_eq!(limiter.check_and_wait().await, Duration::ZERO);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test]
async fn test_unknown_window_does_not_block() {
    let limiter = RateLimiter::new();
    assert_eq!(limiter.check_and_wait().await, Duration::ZERO);
}

#[test]
fn test_rolled_window_needs_no_wait() {
    let limiter = RateLimiter::with_grace(Duration::from_secs(1));
    limiter.mark_exhausted(Utc::now() - chrono::Duration::seconds(30));
    assert!(limiter.wait_duration(Utc::now()).is_none());
}
