//! Time utilities

use chrono::Duration;

/// Format milliseconds as a human-readable string
pub fn format_milliseconds(ms: i64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60000 {
        format!("{:.2}s", ms as f64 / 1000.0)
    } else {
        let seconds = ms / 1000;
        let minutes = seconds / 60;
        let remaining_seconds = seconds % 60;
        format!("{}m {}s", minutes, remaining_seconds)
    }
}

/// Format a wall-clock measurement taken with `Instant::elapsed`
pub fn format_elapsed(elapsed: std::time::Duration) -> String {
    let ms = Duration::from_std(elapsed)
        .map(|d| d.num_milliseconds())
        .unwrap_or(i64::MAX);
    format_milliseconds(ms)
}
