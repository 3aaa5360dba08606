//! Foundational low-level utilities shared across Iris crates.
//!
//! Provides time utilities used by token expiry calculations and mention
//! retention windows, plus HTML escaping for notification rendering.

pub mod html_text;
pub mod time_utils;

pub use html_text::escape_html;
pub use time_utils::{current_unix_timestamp, current_unix_timestamp_ms, is_expired_unix_ms};
