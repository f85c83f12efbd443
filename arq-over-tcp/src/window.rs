//! Sender-side sliding window shared by both retransmission disciplines.
//!
//! [`SendWindow`] owns the bookkeeping every discipline needs: which
//! fragments have been handed out, which are still unacknowledged, and the
//! encoded bytes kept for retransmission.  The [`Discipline`] trait layers
//! the mode-specific rules on top: how ACKs move the base, what a NACK or a
//! timeout retransmits, and which timers run.
//!
//! # Sequence-number layout
//!
//! ```text
//!   base            next_seq        base + window_size
//!    │                 │                 │
//! ───┼─────────────────┼─────────────────┼──────────▶ seq
//!    │◀── in flight ──▶│◀─── sendable ──▶│
//! ```
//!
//! This module only manages state; all stream I/O is the caller's
//! responsibility.  Every method that hands back sequence numbers expects the
//! caller to write `window.frame(seq)` for each of them, in order.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::time::Duration;

use crate::codec::encode_data;
use crate::fragment::Fragment;
use crate::gbn_sender::GoBackN;
use crate::session::{clamp_window, Mode};
use crate::sr_sender::SelectiveRepeat;

/// Sliding-window state for one message transfer.
#[derive(Debug)]
pub struct SendWindow {
    fragments: Vec<Fragment>,
    total_len: u16,
    /// Oldest unacknowledged sequence number.
    base: u16,
    /// Sequence number of the next fragment to send for the first time.
    next_seq: u16,
    window_size: u8,
    /// Encoded frames for `base <= seq < next_seq` not yet acknowledged.
    outstanding: BTreeMap<u16, Vec<u8>>,
}

impl SendWindow {
    /// `total_len` is the byte length of the whole message, carried in every
    /// DATA header.
    pub fn new(fragments: Vec<Fragment>, total_len: u16, window_size: u8) -> Self {
        Self {
            fragments,
            total_len,
            base: 0,
            next_seq: 0,
            window_size: clamp_window(window_size),
            outstanding: BTreeMap::new(),
        }
    }

    pub fn base(&self) -> u16 {
        self.base
    }

    pub fn next_seq(&self) -> u16 {
        self.next_seq
    }

    pub fn window_size(&self) -> u8 {
        self.window_size
    }

    /// Apply a (clamped) window update from the peer.
    pub fn set_window_size(&mut self, window_size: u8) {
        self.window_size = clamp_window(window_size);
    }

    pub fn fragment_count(&self) -> u16 {
        self.fragments.len() as u16
    }

    /// Every fragment has been acknowledged.
    pub fn is_complete(&self) -> bool {
        self.base >= self.fragment_count()
    }

    /// Sent but not yet slid past.
    pub fn in_flight(&self) -> u16 {
        self.next_seq - self.base
    }

    /// `true` when another fragment may be sent for the first time.
    pub fn can_send(&self) -> bool {
        self.next_seq < self.fragment_count() && self.next_seq < self.window_end()
    }

    /// Sequences `[base, next_seq)`.
    pub fn in_flight_range(&self) -> Range<u16> {
        self.base..self.next_seq
    }

    /// Sequences `[base, base + window_size)`.
    pub fn window_range(&self) -> Range<u16> {
        self.base..self.window_end()
    }

    fn window_end(&self) -> u16 {
        self.base.saturating_add(self.window_size as u16)
    }

    /// Encoded bytes of an outstanding frame.
    pub fn frame(&self, seq: u16) -> Option<&[u8]> {
        self.outstanding.get(&seq).map(Vec::as_slice)
    }

    pub fn is_outstanding(&self, seq: u16) -> bool {
        self.outstanding.contains_key(&seq)
    }

    /// Hand out as many new fragments as the window allows.
    ///
    /// Returns the newly assigned sequence numbers, ascending.
    pub fn fill(&mut self) -> Vec<u16> {
        let mut sent = Vec::new();
        while self.can_send() {
            let seq = self.next_seq;
            let fragment = &self.fragments[seq as usize];
            let bytes = encode_data(seq, self.total_len, fragment.flags(), &fragment.payload);
            self.outstanding.insert(seq, bytes);
            self.next_seq += 1;
            sent.push(seq);
        }
        sent
    }

    /// Forget one outstanding frame.  Returns `false` if it was not held.
    ///
    /// The base does not move; see [`SendWindow::advance_base`].
    pub fn acknowledge(&mut self, seq: u16) -> bool {
        self.outstanding.remove(&seq).is_some()
    }

    /// Cumulative acknowledgement: drop every frame `<= seq` and move the
    /// base to `seq + 1`.  Returns how far the base moved.
    ///
    /// `seq` must lie in `[base, next_seq)`.
    pub fn acknowledge_through(&mut self, seq: u16) -> u16 {
        debug_assert!(self.base <= seq && seq < self.next_seq);
        self.outstanding.retain(|&s, _| s > seq);
        let moved = seq + 1 - self.base;
        self.base = seq + 1;
        moved
    }

    /// Slide the base over acknowledged sequences, stopping at the first one
    /// still outstanding.  Returns how far the base moved.
    pub fn advance_base(&mut self) -> u16 {
        let start = self.base;
        while self.base < self.next_seq && !self.outstanding.contains_key(&self.base) {
            self.base += 1;
        }
        self.base - start
    }
}

/// Mode-specific sender rules.
///
/// Each method mutates the window and returns the sequence numbers the
/// caller must now write to the stream.
pub trait Discipline: fmt::Debug + Send {
    fn mode(&self) -> Mode;

    /// Send new fragments while the window has room.
    fn fill_window(&mut self, window: &mut SendWindow) -> Vec<u16>;

    /// Apply an ACK.  Returns how many fragments became acknowledged.
    fn on_ack(&mut self, window: &mut SendWindow, seq: u16) -> usize;

    /// Apply a NACK.
    fn on_nack(&mut self, window: &mut SendWindow, seq: u16) -> Vec<u16>;

    /// Check timers after a poll interval passed without a control frame.
    fn on_timeout(&mut self, window: &mut SendWindow) -> Vec<u16>;
}

/// Build the discipline for a negotiated mode.
pub fn discipline_for(mode: Mode, rto: Duration) -> Box<dyn Discipline> {
    match mode {
        Mode::GoBackN => Box::new(GoBackN::new(rto)),
        Mode::SelectiveRepeat => Box::new(SelectiveRepeat::new(rto)),
    }
}
