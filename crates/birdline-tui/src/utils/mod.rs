//! Utility functions for string formatting.

pub mod format;

pub use format::{age_display, or_placeholder, truncate_string};
