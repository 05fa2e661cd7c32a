//! Local keyboard input forwarding to the PTY.

/// Ctrl+C. Never forwarded: it tears down the whole relay.
pub const INTERRUPT: u8 = 0x03;

/// How a chunk read from the local terminal should be handled
#[derive(Debug, PartialEq, Eq)]
pub enum LocalInput<'a> {
    /// Forward the bytes verbatim
    Forward(&'a [u8]),
    /// The reserved interrupt byte was typed. `before` holds the bytes that
    /// preceded it and are still forwarded; anything after it is dropped.
    Interrupt { before: &'a [u8] },
}

/// Classify a chunk of raw local input.
///
/// Every byte except [`INTERRUPT`] passes through, including other control
/// bytes such as Ctrl+D or ESC.
pub fn classify_local_input(chunk: &[u8]) -> LocalInput<'_> {
    match chunk.iter().position(|&b| b == INTERRUPT) {
        Some(idx) => LocalInput::Interrupt {
            before: &chunk[..idx],
        },
        None => LocalInput::Forward(chunk),
    }
}
