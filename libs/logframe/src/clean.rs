//! Line cleaning for exported logs.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

/// CSI sequences: colors (`ESC[31m`), cursor movement (`ESC[2K`), and friends.
static ANSI_CSI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[a-zA-Z]").expect("ANSI pattern is valid")
});

/// Remove ANSI color and cursor escape sequences.
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    ANSI_CSI.replace_all(text, "")
}

/// Strip escapes and carriage returns, then trim.
///
/// Returns `None` when nothing printable is left.
pub fn clean_line(text: &str) -> Option<String> {
    let stripped = strip_ansi(text);
    let line = stripped.replace('\r', "");
    let line = line.trim();
    if line.is_empty() {
        None
    } else {
        Some(line.to_string())
    }
}
