//! Decides whether a cached snapshot is recent enough to skip a fetch.

use crate::profile::Profile;
use chrono::{Duration, NaiveDateTime};

/// Default maximum snapshot age before a re-fetch is required
pub const DEFAULT_THRESHOLD_DAYS: i64 = 7;

/// `true` only when the snapshot carries a well-formed `updated` stamp
/// younger than `threshold` relative to `now`.
pub fn is_fresh(snapshot: Option<&Profile>, now: NaiveDateTime, threshold: Duration) -> bool {
    snapshot
        .and_then(Profile::last_updated)
        .is_some_and(|updated| now - updated < threshold)
}
