//! Escape sequence interception for agent output.
//!
//! Every chunk read from the child passes through [`intercept`] before it is
//! displayed. Cursor position queries are answered and removed, and known
//! confirmation prompts schedule a default-option keystroke.

use std::time::Duration;

use super::writer::PendingWrite;

/// Device status report query: "where is the cursor?"
pub const CPR_QUERY: &[u8] = b"\x1b[6n";

/// Canned answer to [`CPR_QUERY`]: row 1, column 1
pub const CPR_REPLY: &[u8] = b"\x1b[1;1R";

/// Phrases the agent prints before asking for approval
pub const CONFIRM_MARKERS: &[&str] = &["Do you want to proceed?"];

/// Time allowed for the agent to finish drawing its approval menu
pub const CONFIRM_SETTLE: Duration = Duration::from_millis(500);

/// Keystrokes that accept the highlighted default option
pub fn confirm_keystrokes(settle: Duration) -> PendingWrite {
    PendingWrite::new()
        .then(settle, "\r\n")
        .then(Duration::ZERO, "\r")
}

/// What to do with one output chunk
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Interception {
    /// Bytes to forward to the display
    pub display: Vec<u8>,
    /// Replies to write into the child immediately, one per query found
    pub replies: Vec<Vec<u8>>,
    /// Delayed confirmation keystrokes, if a marker was seen
    pub confirm: Option<PendingWrite>,
}

/// Apply CPR handling and the confirmation bypass to `chunk`.
///
/// Queries split across two chunks are not detected.
pub fn intercept(chunk: &[u8]) -> Interception {
    let (display, queries) = strip_sequence(chunk, CPR_QUERY);
    let replies = vec![CPR_REPLY.to_vec(); queries];

    let confirm = contains_confirm_marker(&display).then(|| confirm_keystrokes(CONFIRM_SETTLE));

    Interception {
        display,
        replies,
        confirm,
    }
}

/// Whether the text of `chunk` contains any confirmation marker
pub fn contains_confirm_marker(chunk: &[u8]) -> bool {
    let text = String::from_utf8_lossy(chunk);
    CONFIRM_MARKERS.iter().any(|marker| text.contains(marker))
}

/// Remove every occurrence of `needle`, returning the remainder and the count
fn strip_sequence(haystack: &[u8], needle: &[u8]) -> (Vec<u8>, usize) {
    let mut out = Vec::with_capacity(haystack.len());
    let mut count = 0;
    let mut i = 0;
    while i < haystack.len() {
        if haystack[i..].starts_with(needle) {
            count += 1;
            i += needle.len();
        } else {
            out.push(haystack[i]);
            i += 1;
        }
    }
    (out, count)
}
