//! Input sanitization.
//!
//! Strips control characters and (optionally) markup while preserving the
//! readable text, then truncates to the per-string cap.

/// Per-string length cap after sanitization.
pub const MAX_STRING_LEN: usize = 10_000;

/// Remove null bytes from a string.
pub fn strip_null_bytes(input: &str) -> String {
    input.replace('\0', "")
}

/// Remove markup tags, preserving text content.
///
/// A small state machine rather than a full HTML parser: everything between
/// `<` and the matching `>` is dropped. Unclosed tags swallow the remainder,
/// which is the safe direction for untrusted input.
pub fn strip_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for ch in input.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Truncate on a char boundary to at most `max` characters.
pub fn truncate_chars(input: &str, max: usize) -> String {
    if input.chars().count() <= max {
        input.to_string()
    } else {
        input.chars().take(max).collect()
    }
}

/// Full sanitization pass: strip nulls, optionally strip tags, truncate.
pub fn sanitize_string(input: &str, strip_html: bool) -> String {
    let cleaned = strip_null_bytes(input);
    let cleaned = if strip_html {
        strip_tags(&cleaned)
    } else {
        cleaned
    };
    truncate_chars(&cleaned, MAX_STRING_LEN)
}
