//! Session-wide parameters fixed by the handshake.
//!
//! A [`SessionConfig`] lives for the whole connection and is shared by every
//! message transfer on it.  Only `window_size` may change afterwards, when
//! the receiver piggybacks a new value on an ACK/NACK.

use std::fmt;
use std::str::FromStr;

use crate::error::UnknownMode;

/// Smallest window a peer may negotiate.
pub const MIN_WINDOW: u8 = 1;
/// Largest window a peer may negotiate.
pub const MAX_WINDOW: u8 = 5;
/// Largest message length representable by the two-digit length prefix.
pub const MAX_MESSAGE_LEN: u16 = 99;
/// An empty message has no fragment to carry its LAST flag.
pub const MIN_MESSAGE_LEN: u16 = 1;

/// Retransmission discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    /// Cumulative ACKs; a loss retransmits the whole outstanding window.
    #[default]
    GoBackN,
    /// Per-frame ACKs; only the affected frame is retransmitted.
    SelectiveRepeat,
}

impl Mode {
    /// Value carried in the `mode` byte of control frames and in the `M`
    /// field of the handshake confirmation.
    pub fn ack_mode(self) -> u8 {
        match self {
            Mode::GoBackN => 1,
            Mode::SelectiveRepeat => 0,
        }
    }

    pub fn from_ack_mode(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Mode::GoBackN),
            0 => Some(Mode::SelectiveRepeat),
            _ => None,
        }
    }

    /// Short tag used in handshake text and log prefixes.
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::GoBackN => "GBN",
            Mode::SelectiveRepeat => "SR",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = UnknownMode;

    /// Case-insensitive, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GBN" => Ok(Mode::GoBackN),
            "SR" => Ok(Mode::SelectiveRepeat),
            _ => Err(UnknownMode(s.to_string())),
        }
    }
}

/// Clamp a window value received from the wire or the command line.
#[inline]
pub fn clamp_window(window: u8) -> u8 {
    window.clamp(MIN_WINDOW, MAX_WINDOW)
}

/// Parameters agreed during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub mode: Mode,
    /// Always within `[MIN_WINDOW, MAX_WINDOW]`.
    pub window_size: u8,
    /// Shortest message (in bytes) the sender will accept.
    pub min_len: u16,
    /// Longest message (in bytes) the sender will accept.
    pub max_len: u16,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: Mode::GoBackN,
            window_size: MAX_WINDOW,
            min_len: 30,
            max_len: 50,
        }
    }
}

impl SessionConfig {
    /// Build a config, clamping the window and normalising the length range.
    ///
    /// Both bounds end up within [`MIN_MESSAGE_LEN`]..=[`MAX_MESSAGE_LEN`],
    /// with `min_len` capped at `max_len`.
    pub fn new(mode: Mode, window_size: u8, min_len: u16, max_len: u16) -> Self {
        let max_len = max_len.clamp(MIN_MESSAGE_LEN, MAX_MESSAGE_LEN);
        Self {
            mode,
            window_size: clamp_window(window_size),
            min_len: min_len.clamp(MIN_MESSAGE_LEN, max_len),
            max_len,
        }
    }

    /// `true` when a message of `len` bytes may be sent in this session.
    pub fn accepts_len(&self, len: usize) -> bool {
        (self.min_len as usize..=self.max_len as usize).contains(&len)
    }

    /// Apply a window value piggybacked on a control frame.
    ///
    /// Zero means "no update".  Returns the previous window when it changed.
    pub fn update_window(&mut self, advertised: u8) -> Option<u8> {
        if advertised == 0 {
            return None;
        }
        let new = clamp_window(advertised);
        if new == self.window_size {
            return None;
        }
        let old = self.window_size;
        self.window_size = new;
        Some(old)
    }
}
