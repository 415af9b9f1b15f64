//! Input hygiene for free-text student messages.
//!
//! A blunt denylist, not an HTML parser: `<script>` blocks are removed, then
//! every remaining angle bracket, then surrounding whitespace. Anything else
//! passes through untouched.

use std::sync::LazyLock;

use regex_lite::Regex;

static SCRIPT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    // Non-greedy: each opening tag closes at the first `</script>` after it.
    Regex::new(r"(?is)<script\b.*?</script>").expect("static pattern compiles")
});

/// Strip script blocks and angle brackets, then trim.
pub fn sanitize(input: &str) -> String {
    let without_scripts = SCRIPT_BLOCK.replace_all(input, "");
    without_scripts
        .chars()
        .filter(|c| *c != '<' && *c != '>')
        .collect::<String>()
        .trim()
        .to_string()
}

/// Length in characters, the unit plan limits are expressed in.
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// A sanitized message that exceeded the plan's length ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("message too long: {current} characters (max {max})")]
pub struct TooLong {
    pub current: usize,
    pub max: usize,
}

/// Sanitize `input` and enforce `max` characters on the result.
pub fn sanitize_with_limit(input: &str, max: usize) -> Result<String, TooLong> {
    let clean = sanitize(input);
    let current = char_len(&clean);
    if current > max {
        return Err(TooLong { current, max });
    }
    Ok(clean)
}
