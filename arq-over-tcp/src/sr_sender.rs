//! Selective Repeat send-side rules.
//!
//! - ACKs are **individual**: `ACK(s)` acknowledges `s` alone.  The base
//!   slides only across acknowledged sequences and never skips a hole.
//! - Each outstanding frame has its own timer.  When one expires (and the
//!   frame still lies in `[base, base + window)`) only that frame is
//!   retransmitted and its timer re-armed.
//! - A NACK retransmits only the named frame.
//!
//! This module only manages state; all stream I/O is the caller's
//! responsibility.

use std::time::Duration;

use crate::session::Mode;
use crate::timer::PacketTimers;
use crate::window::{Discipline, SendWindow};

/// Selective Repeat sender state beyond the shared window: one timer per
/// outstanding frame.
#[derive(Debug)]
pub struct SelectiveRepeat {
    timers: PacketTimers,
}

impl SelectiveRepeat {
    pub fn new(rto: Duration) -> Self {
        Self {
            timers: PacketTimers::new(rto),
        }
    }

    pub fn timers(&self) -> &PacketTimers {
        &self.timers
    }
}

impl Discipline for SelectiveRepeat {
    fn mode(&self) -> Mode {
        Mode::SelectiveRepeat
    }

    fn fill_window(&mut self, window: &mut SendWindow) -> Vec<u16> {
        let sent = window.fill();
        for &seq in &sent {
            self.timers.arm(seq);
        }
        sent
    }

    fn on_ack(&mut self, window: &mut SendWindow, seq: u16) -> usize {
        if !window.acknowledge(seq) {
            return 0;
        }
        self.timers.disarm(seq);
        let moved = window.advance_base();
        if moved > 0 {
            log::trace!("[sr] base → {}", window.base());
        }
        1
    }

    fn on_nack(&mut self, window: &mut SendWindow, seq: u16) -> Vec<u16> {
        if !window.is_outstanding(seq) {
            log::debug!("[sr] ← NACK seq={seq} for a frame no longer outstanding");
            return Vec::new();
        }
        log::debug!("[sr] ← NACK seq={seq}; retransmitting it");
        self.timers.arm(seq);
        vec![seq]
    }

    fn on_timeout(&mut self, window: &mut SendWindow) -> Vec<u16> {
        let expired: Vec<u16> = self
            .timers
            .expired(window.window_range())
            .into_iter()
            .filter(|&seq| window.is_outstanding(seq))
            .collect();
        if !expired.is_empty() {
            log::debug!("[sr] timeout, retransmitting expired {expired:?}");
        }
        for &seq in &expired {
            self.timers.arm(seq);
        }
        expired
    }
}
