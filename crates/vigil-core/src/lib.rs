//! Foundational low-level utilities shared across Vigil crates.
//!
//! Provides wall-clock helpers used for notice expiry and the relative
//! "time ago" labels rendered next to alerts, feeds, and history events.

pub mod time_utils;

pub use time_utils::{current_unix_timestamp_ms, is_expired_unix_ms, time_ago};
