//! Small helpers shared by the engine, the config layer and the transport.

use crate::error::{Error, Result};

/// Longest remote error body kept on a queue item.
const ERROR_EXCERPT_CHARS: usize = 180;

/// Trimmed text, or `None` when only whitespace is left.
pub fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Trimmed text that must not be blank, such as staff names and note bodies.
pub fn required_text(field: &str, value: &str) -> Result<String> {
    non_blank(value).ok_or_else(|| Error::validation(format!("{field} must not be empty")))
}

/// Canonical form of the API base URL: trimmed, no trailing slash, with an
/// explicit `http://` or `https://` scheme.
pub fn api_base_url(raw: &str) -> Result<String> {
    let base = raw.trim().trim_end_matches('/');
    if base.is_empty() {
        return Err(Error::validation("API base URL must not be empty"));
    }
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        return Err(Error::validation(
            "API base URL must include http:// or https://",
        ));
    }
    Ok(base.to_string())
}

/// Squash a remote error body onto one bounded line so it reads well as a
/// queue item's `last_error`.
pub fn error_excerpt(body: &str) -> String {
    body.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(ERROR_EXCERPT_CHARS)
        .collect()
}

/// Current Unix timestamp in milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
