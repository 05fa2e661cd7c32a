//! Recent-output tracking for exit diagnostics.

/// Bytes of output kept before trimming
const MAX_TAIL: usize = 4 * 1024;

/// Rolling window over the child's most recent output
#[derive(Debug, Default)]
pub struct OutputTail {
    recent: Vec<u8>,
}

impl OutputTail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append output, keeping only the last `MAX_TAIL` bytes
    pub fn append(&mut self, data: &[u8]) {
        self.recent.extend_from_slice(data);
        if self.recent.len() > MAX_TAIL {
            let excess = self.recent.len() - MAX_TAIL;
            self.recent.drain(..excess);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }

    pub fn len(&self) -> usize {
        self.recent.len()
    }

    /// Recent output as readable text, escape sequences removed
    pub fn text(&self) -> String {
        strip_ansi_codes(&String::from_utf8_lossy(&self.recent))
            .trim()
            .to_string()
    }

    pub fn clear(&mut self) {
        self.recent.clear();
    }
}

/// Strip ANSI escape sequences from a string for reliable text matching
pub fn strip_ansi_codes(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\x1b' {
            if let Some(&next) = chars.peek() {
                if next == '[' {
                    chars.next();
                    // CSI ends at the first letter
                    while let Some(&ch) = chars.peek() {
                        chars.next();
                        if ch.is_ascii_alphabetic() {
                            break;
                        }
                    }
                } else if next == ']' {
                    // OSC ends at BEL or ST
                    chars.next();
                    while let Some(ch) = chars.next() {
                        if ch == '\x07' {
                            break;
                        }
                        if ch == '\x1b' && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi_codes_empty() {
        assert_eq!(strip_ansi_codes(""), "");
    }

    #[test]
    fn test_strip_ansi_codes_color() {
        assert_eq!(strip_ansi_codes("\x1b[31mred text\x1b[0m"), "red text");
    }

    #[test]
    fn test_strip_ansi_codes_cursor_query() {
        assert_eq!(strip_ansi_codes("a\x1b[6nb\x1b[10;5Hc"), "abc");
    }

    #[test]
    fn test_strip_ansi_codes_osc_title() {
        assert_eq!(strip_ansi_codes("\x1b]0;claude\x07ready"), "ready");
        assert_eq!(strip_ansi_codes("\x1b]0;claude\x1b\\ready"), "ready");
    }

    #[test]
    fn test_tail_trims_to_window() {
        let mut tail = OutputTail::new();
        tail.append(&vec![b'a'; MAX_TAIL]);
        tail.append(b"zz");
        assert_eq!(tail.len(), MAX_TAIL);
        assert!(tail.text().ends_with("zz"));
    }

    #[test]
    fn test_tail_text_strips_escapes() {
        let mut tail = OutputTail::new();
        tail.append(b"\x1b[1mError:\x1b[0m not logged in\r\n");
        assert_eq!(tail.text(), "Error: not logged in");
        tail.clear();
        assert!(tail.is_empty());
    }
}
