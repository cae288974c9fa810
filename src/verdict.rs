//! Verdict determination for one stress test

use crate::constants::MAX_DIAGNOSTIC_CHARS;
use crate::runner::ProcessResult;
use crate::utils::{format_elapsed, truncate_chars};

/// Outcome of comparing the candidate against the reference for one test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// Test identifier the verdict belongs to
    pub test_id: u64,
    /// Whether the candidate matched the reference
    pub correct: bool,
    /// Human-readable report, one line on success
    pub message: String,
}

impl Verdict {
    /// Create an accepted verdict
    pub fn accepted(test_id: u64, candidate: &ProcessResult) -> Self {
        Self {
            test_id,
            correct: true,
            message: format!("Test #{}: OK ({})", test_id, format_elapsed(candidate.elapsed)),
        }
    }

    /// Create a wrong answer verdict showing both token sequences
    pub fn wrong_answer(test_id: u64, expected: &[&str], found: &[&str]) -> Self {
        Self {
            test_id,
            correct: false,
            message: format!(
                "Test #{}: WRONG ANSWER\nexpected: {}\nfound:    {}",
                test_id,
                render(expected),
                render(found)
            ),
        }
    }

    /// Create a verdict for a candidate that did not exit cleanly
    pub fn execution_error(test_id: u64, candidate: &ProcessResult) -> Self {
        let stderr = candidate.stderr_excerpt();
        let mut message = format!("Test #{}: RUNTIME ERROR ({})", test_id, candidate.exit);
        if !stderr.is_empty() {
            message.push('\n');
            message.push_str(&stderr);
        }

        Self {
            test_id,
            correct: false,
            message,
        }
    }
}

/// Split output into whitespace-delimited tokens
pub fn tokens(output: &str) -> Vec<&str> {
    output.split_whitespace().collect()
}

/// Compare the reference output against the candidate's run.
///
/// Outputs are equal when their token sequences are equal, so trailing
/// newlines, repeated spaces and blank lines never matter.
pub fn compare(test_id: u64, reference: &[u8], candidate: &ProcessResult) -> Verdict {
    if !candidate.is_success() {
        return Verdict::execution_error(test_id, candidate);
    }

    let reference = String::from_utf8_lossy(reference);
    let found = String::from_utf8_lossy(&candidate.output);
    let expected_tokens = tokens(&reference);
    let found_tokens = tokens(&found);

    if expected_tokens == found_tokens {
        Verdict::accepted(test_id, candidate)
    } else {
        Verdict::wrong_answer(test_id, &expected_tokens, &found_tokens)
    }
}

fn render(tokens: &[&str]) -> String {
    if tokens.is_empty() {
        return "<empty>".to_string();
    }
    truncate_chars(&tokens.join(" "), MAX_DIAGNOSTIC_CHARS)
}
