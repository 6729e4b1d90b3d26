//! Shared helpers for error-message classification.

/// Transient-failure vocabulary shared by retry classification and the
/// failed-job surface. Matching is case-insensitive substring search.
const TRANSIENT_PATTERNS: [&str; 7] = [
    "timeout",
    "timed out",
    "connection",
    "network",
    "rate limit",
    "429",
    "too many requests",
];

/// Check whether an error message looks like a transient upstream failure.
pub fn is_transient_message(message: &str) -> bool {
    let msg = message.to_lowercase();
    TRANSIENT_PATTERNS.iter().any(|p| msg.contains(p))
}
