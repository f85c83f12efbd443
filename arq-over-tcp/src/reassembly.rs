//! Receive-side decisions shared by both disciplines.
//!
//! A [`Reassembly`] consumes validated DATA frames for one message and says,
//! for each, what to reply and whether the message is now complete.  Frames
//! whose checksum failed go through [`Reassembly::on_corrupt`] instead of
//! being treated as errors.

use std::fmt;

use crate::codec::{ControlKind, DataFrame};
use crate::gbn_receiver::GbnReceiver;
use crate::session::Mode;
use crate::sr_receiver::SrReceiver;

/// Control frame the receiver must send back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Ack(u16),
    Nack(u16),
}

impl Reply {
    pub fn kind(self) -> ControlKind {
        match self {
            Reply::Ack(_) => ControlKind::Ack,
            Reply::Nack(_) => ControlKind::Nack,
        }
    }

    pub fn seq(self) -> u16 {
        match self {
            Reply::Ack(seq) | Reply::Nack(seq) => seq,
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Ack(seq) => write!(f, "ACK({seq})"),
            Reply::Nack(seq) => write!(f, "NACK({seq})"),
        }
    }
}

/// What happened to a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Appended to the delivered stream immediately.
    Accepted,
    /// Stored for later in-order delivery (SR only).
    Buffered,
    /// Already received; nothing changed.
    Duplicate,
    /// Ahead of the expected sequence and discarded (GBN only).
    OutOfOrder,
    /// Checksum failed (real or injected).
    Corrupted,
}

/// Result of feeding one frame to a [`Reassembly`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub reply: Reply,
    pub outcome: Outcome,
    /// The LAST fragment has been delivered in order.
    pub complete: bool,
}

/// Mode-specific receiver state for one message.
pub trait Reassembly: fmt::Debug + Send {
    fn mode(&self) -> Mode;

    /// Handle a frame whose checksum verified.
    fn on_frame(&mut self, frame: &DataFrame) -> Verdict;

    /// Handle a frame with sequence `seq` whose checksum failed.
    fn on_corrupt(&mut self, seq: u16) -> Verdict;

    fn is_complete(&self) -> bool;

    /// Bytes delivered in order so far.
    fn delivered(&self) -> &[u8];

    /// Move the delivered bytes out, leaving the state able to answer
    /// stragglers.
    fn take_payload(&mut self) -> Vec<u8>;
}

/// Build the receiver state for a negotiated mode.
pub fn reassembly_for(mode: Mode) -> Box<dyn Reassembly> {
    match mode {
        Mode::GoBackN => Box::new(GbnReceiver::new()),
        Mode::SelectiveRepeat => Box::new(SrReceiver::new()),
    }
}
