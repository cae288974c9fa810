//! Text helpers for diagnostics

/// Keep at most `max` characters of `text`, marking the cut with `...`
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
