//! Injectable wall clock.

use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Source of the current time for environment attributes and cache expiry.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// The system wall clock.
pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// A clock frozen at `instant`.
pub fn fixed_clock(instant: DateTime<Utc>) -> Clock {
    Arc::new(move || instant)
}
