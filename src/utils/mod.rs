//! Utility functions

pub mod random;
pub mod text;
pub mod time;

pub use random::generate_token;
pub use text::truncate_chars;
pub use time::{format_elapsed, format_milliseconds};
