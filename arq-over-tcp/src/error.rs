//! Error taxonomy for the transfer engine.
//!
//! Only conditions that end a message transfer (or the whole session) are
//! errors.  Corrupted frames, duplicates and out-of-order arrivals are
//! ordinary receiver outcomes (see [`crate::reassembly::Outcome`]) and a
//! retransmission timeout is plain control flow.

use thiserror::Error;

use crate::session::Mode;

/// A mode name is neither `GBN` nor `SR`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown mode {0:?} (expected GBN or SR)")]
pub struct UnknownMode(pub String);

/// A frame could not be parsed from the bytes on the stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Fewer bytes than the frame layout requires.
    #[error("truncated frame: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    /// The type tag is not one this side understands.
    ///
    /// Callers treat this as protocol noise and discard the frame.
    #[error("unknown frame tag 0x{0:02x}")]
    UnknownTag(u8),
    /// The two-digit message length prefix was not ASCII digits.
    #[error("bad length prefix {0:?}")]
    BadLengthPrefix([u8; 2]),
    /// A message kept growing past the negotiated maximum without a LAST
    /// fragment.
    #[error("message overran {max} bytes ({received} delivered)")]
    Overrun { max: u16, received: usize },
}

/// A message could not be split into UTF-8-safe fragments.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FragmentError {
    #[error("no decodable UTF-8 prefix at byte offset {offset}")]
    Undecodable { offset: usize },
}

/// The session-start exchange failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    #[error("malformed handshake line: {0:?}")]
    Malformed(String),
    #[error("requested {requested} but peer confirmed {confirmed}")]
    ModeMismatch { requested: Mode, confirmed: Mode },
    #[error("handshake line exceeds {0} bytes")]
    TooLong(usize),
}

/// Top-level error returned by the sender and receiver drivers.
#[derive(Error, Debug)]
pub enum ArqError {
    #[error("framing error: {0}")]
    Framing(#[from] FrameError),
    #[error("transport closed by peer")]
    TransportClosed,
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("handshake failed: {0}")]
    Handshake(#[from] HandshakeError),
    #[error("fragmentation failed: {0}")]
    Fragment(#[from] FragmentError),
    #[error("message is {len} bytes, allowed range is {min}..={max}")]
    MessageLength { len: usize, min: u16, max: u16 },
}

impl ArqError {
    /// `true` when the connection can no longer be used.
    ///
    /// A rejected message leaves the session intact; everything else tears
    /// it down.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ArqError::MessageLength { .. } | ArqError::Fragment(_))
    }
}
