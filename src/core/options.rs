//! Watch timing options.

use std::time::Duration;

/// Default quiet period before a detected change is reloaded.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(10);

/// Default interval between file metadata checks.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Timing of resource watching, fixed once the handle is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    /// How long a resource must stay quiet after a change before it is reloaded
    pub debounce: Duration,
    /// How often file metadata is compared when no OS notification arrives
    pub check_interval: Duration,
}

impl WatchOptions {
    /// Create options with explicit timings.
    pub fn new(debounce: Duration, check_interval: Duration) -> Self {
        Self {
            debounce,
            check_interval,
        }
    }
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE, DEFAULT_CHECK_INTERVAL)
    }
}
