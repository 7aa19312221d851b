//! Built-in actions.
//!
//! | Action                      | Purpose                                      |
//! |-----------------------------|----------------------------------------------|
//! | [`LogBefore`] / [`LogAfter`]| Log the request and its downstream latency   |
//! | [`ApiKeyCheck`]             | Reject requests without an accepted API key  |
//! | [`Throttle`]                | Fixed-window request throttle                |
//!
//! [`api_managed`] composes them the usual way:
//! `LogBefore → ApiKeyCheck → Throttle → LogAfter`.

pub mod api_key;
pub mod throttle;
pub mod timing;

pub use api_key::{ApiKeyCheck, API_KEY_STATE};
pub use throttle::{Admission, Throttle, ThrottleBuilder, MAX_LIMIT};
pub use timing::{LogAfter, LogBefore, START_STATE};

use crate::action::{ActionExt, AndThen};

/// The chain guarding managed API endpoints.
pub type ApiManaged = AndThen<AndThen<AndThen<LogBefore, ApiKeyCheck>, Throttle>, LogAfter>;

/// Builds `LogBefore → ApiKeyCheck → Throttle → LogAfter`.
pub fn api_managed(keys: ApiKeyCheck, throttle: Throttle) -> ApiManaged {
    LogBefore.and_then(keys).and_then(throttle).and_then(LogAfter)
}
