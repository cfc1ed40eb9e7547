//! Harvest tuning constants

use std::time::Duration;

/// Maximum number of pages walked in one pagination session.
/// Guards against a remote that keeps handing out `next` links forever;
/// 10,000 pages of 100 repositories is far beyond any real owner.
pub const MAX_PAGES: usize = 10_000;

/// Maximum number of rate-limit waits for a single page.
/// A page that is still rejected after three full window resets points at a
/// misbehaving quota, not a transient exhaustion.
pub const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Extra time slept past the advertised reset instant.
/// The reset header has one-second resolution, so waiting exactly until it can
/// land a request in the old window.
pub const RESET_GRACE: Duration = Duration::from_secs(1);

/// Directory under the home directory used when no storage root is given
pub const DEFAULT_STORAGE_DIR_NAME: &str = ".repo-harvester";

/// Number of repositories kept after shaping when no limit is given (0 = all)
pub const DEFAULT_MAX_COUNT: usize = 0;
