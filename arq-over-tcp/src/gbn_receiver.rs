//! Go-Back-N receive-side state machine.
//!
//! [`GbnReceiver`] implements the receiver side of Go-Back-N:
//!
//! - Only **in-order** frames are accepted (`seq == expected_seq`); each one
//!   is acknowledged with `ACK(expected_seq - 1)`.
//! - A frame ahead of `expected_seq` is discarded.  It is answered with
//!   `ACK(last_in_order)` once any data has been delivered, and with
//!   `NACK(expected_seq)` before that, which prompts the sender without
//!   waiting for its timer.
//! - A frame behind `expected_seq` is a duplicate and is re-ACKed.
//! - A corrupted frame is answered with `NACK(expected_seq)`: the bad frame
//!   is dropped and the still-expected sequence is what the sender needs.
//!
//! This module only manages state; all stream I/O is the caller's
//! responsibility.

use crate::codec::DataFrame;
use crate::reassembly::{Outcome, Reassembly, Reply, Verdict};
use crate::session::Mode;

/// Go-Back-N receive-side state for one message.
#[derive(Debug, Default)]
pub struct GbnReceiver {
    /// Next in-order sequence number.
    expected_seq: u16,
    /// Highest sequence delivered so far; `None` before the first one.
    ///
    /// Always `expected_seq - 1` when `Some`.
    last_in_order: Option<u16>,
    payload: Vec<u8>,
    complete: bool,
}

impl GbnReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expected_seq(&self) -> u16 {
        self.expected_seq
    }

    pub fn last_in_order(&self) -> Option<u16> {
        self.last_in_order
    }

    /// `ACK(last_in_order)` if anything was delivered, else
    /// `NACK(expected_seq)`.
    fn cumulative_reply(&self) -> Reply {
        self.last_in_order
            .map_or(Reply::Nack(self.expected_seq), Reply::Ack)
    }
}

impl Reassembly for GbnReceiver {
    fn mode(&self) -> Mode {
        Mode::GoBackN
    }

    fn on_frame(&mut self, frame: &DataFrame) -> Verdict {
        let seq = frame.header.seq;

        if seq == self.expected_seq && !self.complete {
            self.payload.extend_from_slice(&frame.payload);
            self.last_in_order = Some(seq);
            self.expected_seq += 1;
            self.complete = frame.is_last();
            return Verdict {
                reply: Reply::Ack(seq),
                outcome: Outcome::Accepted,
                complete: self.complete,
            };
        }

        let outcome = if seq < self.expected_seq {
            Outcome::Duplicate
        } else {
            Outcome::OutOfOrder
        };
        Verdict {
            reply: self.cumulative_reply(),
            outcome,
            complete: self.complete,
        }
    }

    fn on_corrupt(&mut self, _seq: u16) -> Verdict {
        Verdict {
            reply: Reply::Nack(self.expected_seq),
            outcome: Outcome::Corrupted,
            complete: self.complete,
        }
    }

    fn is_complete(&self) -> bool {
        self.complete
    }

    fn delivered(&self) -> &[u8] {
        &self.payload
    }

    fn take_payload(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reassembly::test_support::frame;

    #[test]
    fn initial_state() {
        let r = GbnReceiver::new();
        assert_eq!(r.expected_seq(), 0);
        assert_eq!(r.last_in_order(), None);
        assert!(r.delivered().is_empty());
        assert!(!r.is_complete());
    }

    #[test]
    fn in_order_frames_advance_by_one() {
        let mut r = GbnReceiver::new();
        for seq in 0..3u16 {
            let v = r.on_frame(&frame(seq, b"abcd", false));
            assert_eq!(v.reply, Reply::Ack(seq));
            assert_eq!(v.outcome, Outcome::Accepted);
            assert_eq!(r.expected_seq(), seq + 1);
            assert_eq!(r.last_in_order(), Some(seq));
        }
        assert_eq!(r.delivered().len(), 12);
    }

    #[test]
    fn last_flag_completes() {
        let mut r = GbnReceiver::new();
        r.on_frame(&frame(0, b"abcd", false));
        let v = r.on_frame(&frame(1, b"ef", true));
        assert!(v.complete);
        assert!(r.is_complete());
        assert_eq!(r.delivered(), b"abcdef");
    }

    #[test]
    fn gap_before_any_delivery_nacks_expected() {
        let mut r = GbnReceiver::new();
        let v = r.on_frame(&frame(2, b"cccc", false));
        assert_eq!(v.reply, Reply::Nack(0));
        assert_eq!(v.outcome, Outcome::OutOfOrder);
        assert!(r.delivered().is_empty());
    }

    #[test]
    fn gap_after_delivery_acks_last_in_order() {
        let mut r = GbnReceiver::new();
        r.on_frame(&frame(0, b"aaaa", false));
        r.on_frame(&frame(1, b"bbbb", false));
        let v = r.on_frame(&frame(3, b"dddd", false));
        assert_eq!(v.reply, Reply::Ack(1));
        assert_eq!(v.outcome, Outcome::OutOfOrder);
        assert_eq!(r.expected_seq(), 2, "expected_seq must not advance on a gap");
        assert_eq!(r.delivered(), b"aaaabbbb");
    }

    #[test]
    fn duplicate_is_reacked_without_change() {
        let mut r = GbnReceiver::new();
        r.on_frame(&frame(0, b"aaaa", false));
        r.on_frame(&frame(1, b"bbbb", false));
        let v = r.on_frame(&frame(0, b"aaaa", false));
        assert_eq!(v.reply, Reply::Ack(1));
        assert_eq!(v.outcome, Outcome::Duplicate);
        assert_eq!(r.delivered(), b"aaaabbbb");
    }

    #[test]
    fn corruption_nacks_still_expected_sequence() {
        let mut r = GbnReceiver::new();
        r.on_frame(&frame(0, b"aaaa", false));
        let v = r.on_corrupt(3);
        assert_eq!(v.reply, Reply::Nack(1));
        assert_eq!(v.outcome, Outcome::Corrupted);
    }

    #[test]
    fn completed_state_answers_stragglers() {
        let mut r = GbnReceiver::new();
        r.on_frame(&frame(0, b"aaaa", false));
        r.on_frame(&frame(1, b"b", true));
        let payload = r.take_payload();
        assert_eq!(payload, b"aaaab");

        let v = r.on_frame(&frame(0, b"aaaa", false));
        assert_eq!(v.reply, Reply::Ack(1));
        assert_eq!(v.outcome, Outcome::Duplicate);
        assert!(v.complete);
        assert!(r.delivered().is_empty());
    }
}
