//! Selective Repeat receive-side state machine.
//!
//! Every verified frame is acknowledged individually.  Frames that arrive
//! ahead of `expected_base` are buffered; after each new frame the buffer is
//! drained upward from `expected_base`, so payload is always delivered in
//! ascending sequence order with no gaps.  The message completes when a
//! drained frame carries LAST.

use std::collections::BTreeMap;

use crate::codec::{flags, DataFrame};
use crate::reassembly::{Outcome, Reassembly, Reply, Verdict};
use crate::session::Mode;

/// Selective Repeat receive-side state for one message.
#[derive(Debug, Default)]
pub struct SrReceiver {
    /// Lowest sequence not yet delivered.
    expected_base: u16,
    /// Received but undeliverable frames; every key is `>= expected_base`.
    reorder: BTreeMap<u16, (u8, Vec<u8>)>,
    payload: Vec<u8>,
    complete: bool,
}

impl SrReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expected_base(&self) -> u16 {
        self.expected_base
    }

    /// Number of frames waiting for a gap to fill.
    pub fn buffered(&self) -> usize {
        self.reorder.len()
    }

    fn already_received(&self, seq: u16) -> bool {
        seq < self.expected_base || self.reorder.contains_key(&seq)
    }

    /// Deliver the contiguous run starting at `expected_base`.
    fn drain(&mut self) {
        while let Some((frame_flags, payload)) = self.reorder.remove(&self.expected_base) {
            self.payload.extend_from_slice(&payload);
            log::trace!("[sr] delivered seq={}", self.expected_base);
            self.expected_base += 1;
            if frame_flags & flags::LAST != 0 {
                self.complete = true;
                break;
            }
        }
    }
}

impl Reassembly for SrReceiver {
    fn mode(&self) -> Mode {
        Mode::SelectiveRepeat
    }

    fn on_frame(&mut self, frame: &DataFrame) -> Verdict {
        let seq = frame.header.seq;
        if self.already_received(seq) {
            return Verdict {
                reply: Reply::Ack(seq),
                outcome: Outcome::Duplicate,
                complete: self.complete,
            };
        }

        self.reorder
            .insert(seq, (frame.header.flags, frame.payload.clone()));
        let before = self.expected_base;
        self.drain();
        let outcome = if self.expected_base > before {
            Outcome::Accepted
        } else {
            Outcome::Buffered
        };
        Verdict {
            reply: Reply::Ack(seq),
            outcome,
            complete: self.complete,
        }
    }

    fn on_corrupt(&mut self, seq: u16) -> Verdict {
        Verdict {
            reply: Reply::Nack(seq),
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
    fn in_order_frames_deliver_immediately() {
        let mut r = SrReceiver::new();
        let v = r.on_frame(&frame(0, b"aaaa", false));
        assert_eq!(v.reply, Reply::Ack(0));
        assert_eq!(v.outcome, Outcome::Accepted);
        assert_eq!(r.expected_base(), 1);
        assert_eq!(r.delivered(), b"aaaa");
    }

    #[test]
    fn out_of_order_frame_is_buffered_and_acked() {
        let mut r = SrReceiver::new();
        let v = r.on_frame(&frame(2, b"cccc", false));
        assert_eq!(v.reply, Reply::Ack(2));
        assert_eq!(v.outcome, Outcome::Buffered);
        assert_eq!(r.buffered(), 1);
        assert!(r.delivered().is_empty());
    }

    #[test]
    fn gap_fill_drains_run_in_order() {
        let mut r = SrReceiver::new();
        r.on_frame(&frame(2, b"cccc", false));
        r.on_frame(&frame(1, b"bbbb", false));
        assert!(r.delivered().is_empty());

        let v = r.on_frame(&frame(0, b"aaaa", false));
        assert_eq!(v.outcome, Outcome::Accepted);
        assert_eq!(r.delivered(), b"aaaabbbbcccc");
        assert_eq!(r.expected_base(), 3);
        assert_eq!(r.buffered(), 0);
    }

    #[test]
    fn permuted_arrival_completes_without_gaps() {
        let mut r = SrReceiver::new();
        let parts: [&[u8]; 5] = [b"0000", b"1111", b"2222", b"3333", b"44"];
        for seq in [3u16, 0, 4, 2, 1] {
            let v = r.on_frame(&frame(seq, parts[seq as usize], seq == 4));
            assert_eq!(v.reply, Reply::Ack(seq));
            // Delivered bytes are always a prefix of the message.
            assert_eq!(r.delivered(), &parts.concat()[..r.delivered().len()]);
        }
        assert!(r.is_complete());
        assert_eq!(r.delivered(), parts.concat().as_slice());
    }

    #[test]
    fn duplicate_is_reacked_and_not_rebuffered() {
        let mut r = SrReceiver::new();
        r.on_frame(&frame(0, b"aaaa", false));
        r.on_frame(&frame(2, b"cccc", false));

        let dup_delivered = r.on_frame(&frame(0, b"aaaa", false));
        assert_eq!(dup_delivered.reply, Reply::Ack(0));
        assert_eq!(dup_delivered.outcome, Outcome::Duplicate);

        let dup_buffered = r.on_frame(&frame(2, b"cccc", false));
        assert_eq!(dup_buffered.outcome, Outcome::Duplicate);
        assert_eq!(r.buffered(), 1);
        assert_eq!(r.delivered(), b"aaaa");
    }

    #[test]
    fn corruption_nacks_the_bad_sequence() {
        let mut r = SrReceiver::new();
        let v = r.on_corrupt(3);
        assert_eq!(v.reply, Reply::Nack(3));
        assert_eq!(v.outcome, Outcome::Corrupted);
    }

    #[test]
    fn buffered_last_completes_only_when_drained() {
        let mut r = SrReceiver::new();
        let v = r.on_frame(&frame(1, b"zz", true));
        assert!(!v.complete);
        let v = r.on_frame(&frame(0, b"yyyy", false));
        assert!(v.complete);
        assert_eq!(r.delivered(), b"yyyyzz");
    }
}
