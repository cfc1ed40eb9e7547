//! Rate-limit window tracking
//!
//! Tracks the remaining call budget advertised by the remote and blocks the
//! caller until the window resets when the budget is spent. The wait is a
//! plain sleep on the calling task: harvesting is a background batch job, so
//! stalling for up to a full window (commonly an hour) is acceptable.

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::dates::unixtime_to_datetime;
use crate::harvester::config::RESET_GRACE;

/// Header carrying the remaining call budget
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Header carrying the window reset instant (unix seconds)
pub const RESET_HEADER: &str = "x-ratelimit-reset";

/// Quota accounting period as last reported by the remote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitWindow {
    /// Calls left in the current window
    pub remaining: u32,
    /// Instant at which the budget is replenished
    pub reset_at: DateTime<Utc>,
}

impl RateLimitWindow {
    /// Whether no calls are left in this window
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

/// Remaining budget from the response headers, if present and well-formed
pub fn parse_remaining(headers: &HeaderMap) -> Option<u32> {
    let raw = headers.get(REMAINING_HEADER)?.to_str().ok()?;
    match raw.trim().parse::<u32>() {
        Ok(remaining) => Some(remaining),
        Err(e) => {
            warn!("Failed to parse {} header '{}': {}", REMAINING_HEADER, raw, e);
            None
        }
    }
}

/// Reset instant from the response headers, if present and well-formed
pub fn parse_reset(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    let raw = headers.get(RESET_HEADER)?.to_str().ok()?;
    let seconds = match raw.trim().parse::<i64>() {
        Ok(seconds) => seconds,
        Err(e) => {
            warn!("Failed to parse {} header '{}': {}", RESET_HEADER, raw, e);
            return None;
        }
    };
    unixtime_to_datetime(seconds)
        .map_err(|e| warn!("Ignoring {} header: {}", RESET_HEADER, e))
        .ok()
}

/// Reset instant of a 403 that signals an exhausted quota
///
/// A 403 only counts as a rate-limit rejection when it carries a reset
/// instant and does not advertise budget left; GitHub sends the reset header
/// on every response, including plain permission failures that still have
/// budget. `None` means the rejection is not recoverable by waiting.
pub fn exhausted_until(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    let reset_at = parse_reset(headers)?;
    match parse_remaining(headers) {
        Some(remaining) if remaining > 0 => None,
        _ => Some(reset_at),
    }
}

/// Rate limiter driven by the remote's own accounting
#[derive(Debug)]
pub struct RateLimiter {
    window: Mutex<Option<RateLimitWindow>>,
    grace: Duration,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    /// Create a limiter with no known window
    pub fn new() -> Self {
        Self::with_grace(RESET_GRACE)
    }

    /// Create a limiter that sleeps `grace` past the advertised reset
    pub fn with_grace(grace: Duration) -> Self {
        Self {
            window: Mutex::new(None),
            grace,
        }
    }

    /// Last known window
    pub fn window(&self) -> Option<RateLimitWindow> {
        *self.lock()
    }

    /// Replace the known window
    pub fn set_window(&self, window: Option<RateLimitWindow>) {
        *self.lock() = window;
    }

    /// Record that the remote rejected a call because the budget ran out
    pub fn mark_exhausted(&self, reset_at: DateTime<Utc>) {
        self.set_window(Some(RateLimitWindow {
            remaining: 0,
            reset_at,
        }));
    }

    /// Refresh the window from response headers
    ///
    /// A response with only the remaining count updates the count of the known
    /// window; a response with neither header leaves the window untouched.
    pub fn update(&self, headers: &HeaderMap) -> Option<RateLimitWindow> {
        let remaining = parse_remaining(headers);
        let reset_at = parse_reset(headers);

        let mut window = self.lock();
        match (remaining, reset_at) {
            (Some(remaining), Some(reset_at)) => {
                *window = Some(RateLimitWindow {
                    remaining,
                    reset_at,
                });
            }
            (Some(remaining), None) => {
                if let Some(known) = window.as_mut() {
                    known.remaining = remaining;
                }
            }
            _ => {}
        }

        if let Some(current) = window.as_ref() {
            debug!(
                remaining = current.remaining,
                reset_at = %current.reset_at,
                "Rate limit"
            );
        }
        *window
    }

    /// Time to block before the next request, evaluated at `now`
    ///
    /// `None` when the budget is not spent or the window has already rolled.
    pub fn wait_duration(&self, now: DateTime<Utc>) -> Option<Duration> {
        let window = self.window()?;
        if !window.is_exhausted() {
            return None;
        }

        let resume_at = window.reset_at + self.grace_delta();
        match (resume_at - now).to_std() {
            Ok(delay) if !delay.is_zero() => Some(delay),
            _ => None,
        }
    }

    /// Block until a request may be issued
    ///
    /// Returns immediately unless the known window is exhausted, in which
    /// case it sleeps until `reset_at` plus the grace period. Returns the time
    /// slept.
    pub async fn check_and_wait(&self) -> Duration {
        let Some(delay) = self.wait_duration(Utc::now()) else {
            return Duration::ZERO;
        };

        info!(
            "Rate limit exhausted. Waiting {} secs for rate limit reset.",
            delay.as_secs()
        );
        sleep(delay).await;

        // The budget is replenished; the next response reports the new window
        self.set_window(None);
        delay
    }

    fn grace_delta(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.grace).unwrap_or_else(|_| chrono::Duration::zero())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<RateLimitWindow>> {
        // A poisoned lock only means another task panicked mid-update; the
        // Copy window inside is still valid.
        self.window.lock().unwrap_or_else(|e| e.into_inner())
    }
}
