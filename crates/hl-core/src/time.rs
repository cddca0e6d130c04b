//! Time utilities for homelink
//!
//! Wall-clock helpers for scheduling and expiry checks.

use chrono::{DateTime, TimeZone, Utc};
use std::time::Duration;

const ONE_DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Time remaining until the next midnight in the timezone of `now`.
///
/// Falls back to 24 hours if the next midnight does not exist locally
/// (a DST gap at 00:00).
///
/// # Examples
/// ```
/// use chrono::{TimeZone, Utc};
/// use hl_core::time::until_next_midnight;
///
/// let now = Utc.with_ymd_and_hms(2024, 3, 1, 23, 0, 0).unwrap();
/// assert_eq!(until_next_midnight(&now).as_secs(), 3600);
/// ```
pub fn until_next_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> Duration {
    let next = now
        .date_naive()
        .succ_opt()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .and_then(|midnight| now.timezone().from_local_datetime(&midnight).earliest());

    match next {
        Some(next) => (next - now.clone()).to_std().unwrap_or(Duration::ZERO),
        None => ONE_DAY,
    }
}

/// Time remaining until `deadline`, zero if it already passed.
pub fn until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (deadline - now).to_std().unwrap_or(Duration::ZERO)
}
