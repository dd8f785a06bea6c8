//! Removal of control markup from upstream text.
//!
//! Model servers interleave their output with special tokens such as
//! `<|im_start|>` or `<|eot_id|>` and occasionally leak the bare role name
//! `assistant`. Neither should ever reach the synthesizer.

use once_cell::sync::Lazy;
use regex::Regex;

// `(?s)` so a marker may span newlines; `.*?` keeps adjacent markers separate.
static CONTROL_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<\|.*?\|>").unwrap());
static ROLE_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bassistant\b").unwrap());

/// Strip `<| ... |>` markers and the standalone word `assistant`, then trim.
///
/// An opening `<|` without a matching `|>` is left as-is.
pub fn clean(raw: &str) -> String {
    let without_markers = CONTROL_MARKER.replace_all(raw, "");
    let without_role = ROLE_TOKEN.replace_all(&without_markers, "");
    without_role.trim().to_string()
}
