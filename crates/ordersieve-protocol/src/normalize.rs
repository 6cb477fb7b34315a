//! Text normalization and truncation
//!
//! Every message body goes through [`normalize`] exactly once before the
//! matcher, the remote classifier, and the store see it. The normalized
//! form is also the response-cache key, so normalization must be
//! deterministic and idempotent.

/// Maximum number of characters stored for a message or order body.
pub const MAX_STORED_TEXT_CHARS: usize = 10_000;

/// Minimum trimmed length for any analysis at all.
pub const MIN_ANALYZABLE_CHARS: usize = 3;

/// Normalized texts must be strictly longer than this to justify a paid
/// remote-classifier call.
pub const REMOTE_MIN_CHARS: usize = 20;

/// Normalize a message body.
///
/// Strips null bytes and U+FFFD replacement characters, collapses every
/// whitespace run to a single space, and trims leading and trailing
/// whitespace. Idempotent: `normalize(normalize(t)) == normalize(t)`.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for ch in text.chars() {
        if ch == '\u{0}' || ch == '\u{FFFD}' {
            continue;
        }
        if ch.is_whitespace() {
            // Only emit the separator once a non-space character follows,
            // which also drops leading and trailing runs.
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(ch);
    }
    out
}

/// Normalize a raw byte payload.
///
/// Invalid UTF-8 sequences are repaired lossily; the replacement
/// characters that repair introduces are then removed by [`normalize`].
pub fn normalize_bytes(bytes: &[u8]) -> String {
    normalize(&String::from_utf8_lossy(bytes))
}

/// Truncate a string to at most `max_chars` characters.
///
/// Character-based, never splits a code point. Returns the input untouched
/// when it already fits.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
