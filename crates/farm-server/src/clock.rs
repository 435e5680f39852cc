//! Wall-clock helpers.
//!
//! Maturation deadlines are absolute epoch milliseconds so they survive a
//! restart; the scheduler converts them back to runtime instants here.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::time::Instant;

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// The runtime instant corresponding to an absolute deadline. Deadlines in
/// the past map to "now".
pub fn instant_at(deadline_ms: i64) -> Instant {
    let delay = deadline_ms.saturating_sub(now_ms()).max(0) as u64;
    Instant::now() + Duration::from_millis(delay)
}
