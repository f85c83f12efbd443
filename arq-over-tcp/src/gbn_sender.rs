//! Go-Back-N send-side rules.
//!
//! # Protocol contract
//!
//! - ACKs are **cumulative**: `ACK(a)` means every sequence `<= a` has been
//!   delivered in order.
//! - A single timer runs on the window base.  It starts when the window goes
//!   from empty to non-empty, restarts whenever the base advances with frames
//!   still in flight, and stops when the window drains.
//! - On NACK or timer expiry the **whole** in-flight range `[base, next_seq)`
//!   is retransmitted (go back to N) and the timer restarts.
//!
//! This module only manages state; all stream I/O is the caller's
//! responsibility.

use std::time::Duration;

use crate::session::Mode;
use crate::timer::BaseTimer;
use crate::window::{Discipline, SendWindow};

/// Go-Back-N sender state beyond the shared window: the base timer.
#[derive(Debug)]
pub struct GoBackN {
    timer: BaseTimer,
}

impl GoBackN {
    pub fn new(rto: Duration) -> Self {
        Self {
            timer: BaseTimer::new(rto),
        }
    }

    pub fn timer(&self) -> &BaseTimer {
        &self.timer
    }

    /// Every in-flight sequence, with the timer restarted (or stopped when
    /// nothing is in flight).
    fn retransmit_window(&mut self, window: &SendWindow) -> Vec<u16> {
        let seqs: Vec<u16> = window.in_flight_range().collect();
        if seqs.is_empty() {
            self.timer.stop();
        } else {
            log::debug!(
                "[gbn] go back to base={}, retransmitting {}..={}",
                window.base(),
                window.base(),
                window.next_seq() - 1
            );
            self.timer.start();
        }
        seqs
    }
}

impl Discipline for GoBackN {
    fn mode(&self) -> Mode {
        Mode::GoBackN
    }

    fn fill_window(&mut self, window: &mut SendWindow) -> Vec<u16> {
        let sent = window.fill();
        if !sent.is_empty() && !self.timer.is_running() {
            self.timer.start();
            log::trace!("[gbn] timer start (base={})", window.base());
        }
        sent
    }

    fn on_ack(&mut self, window: &mut SendWindow, seq: u16) -> usize {
        if seq < window.base() || seq >= window.next_seq() {
            // Stale cumulative ACK (or one for data never sent).
            return 0;
        }
        let moved = window.acknowledge_through(seq);
        if window.in_flight() > 0 {
            self.timer.start();
        } else {
            self.timer.stop();
            log::trace!("[gbn] timer stop (base={})", window.base());
        }
        moved as usize
    }

    fn on_nack(&mut self, window: &mut SendWindow, seq: u16) -> Vec<u16> {
        log::debug!("[gbn] ← NACK seq={seq}");
        self.retransmit_window(window)
    }

    fn on_timeout(&mut self, window: &mut SendWindow) -> Vec<u16> {
        if !self.timer.expired() {
            return Vec::new();
        }
        log::debug!("[gbn] timeout at base={}", window.base());
        self.retransmit_window(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::{fragment, FRAGMENT_SIZE};

    const RTO: Duration = Duration::from_millis(1000);

    fn setup(len: usize, window: u8) -> (GoBackN, SendWindow) {
        let msg = vec![b'g'; len];
        let frags = fragment(&msg, FRAGMENT_SIZE).unwrap();
        (GoBackN::new(RTO), SendWindow::new(frags, len as u16, window))
    }

    #[test]
    fn fill_starts_timer_once() {
        let (mut gbn, mut w) = setup(32, 5);
        assert!(!gbn.timer().is_running());
        assert_eq!(gbn.fill_window(&mut w), vec![0, 1, 2, 3, 4]);
        assert!(gbn.timer().is_running());
    }

    #[test]
    fn cumulative_ack_slides_multiple() {
        let (mut gbn, mut w) = setup(32, 5);
        gbn.fill_window(&mut w);
        assert_eq!(gbn.on_ack(&mut w, 2), 3);
        assert_eq!(w.base(), 3);
        assert!(gbn.timer().is_running(), "frames 3 and 4 still in flight");
        assert_eq!(gbn.fill_window(&mut w), vec![5, 6, 7]);
    }

    #[test]
    fn stale_and_future_acks_are_ignored() {
        let (mut gbn, mut w) = setup(32, 5);
        gbn.fill_window(&mut w);
        gbn.on_ack(&mut w, 1);
        assert_eq!(gbn.on_ack(&mut w, 0), 0, "behind base");
        assert_eq!(gbn.on_ack(&mut w, 9), 0, "never sent");
        assert_eq!(w.base(), 2);
    }

    #[test]
    fn final_ack_stops_timer() {
        let (mut gbn, mut w) = setup(8, 5);
        gbn.fill_window(&mut w);
        assert_eq!(gbn.on_ack(&mut w, 1), 2);
        assert!(w.is_complete());
        assert!(!gbn.timer().is_running());
    }

    #[test]
    fn nack_retransmits_entire_window() {
        let (mut gbn, mut w) = setup(32, 5);
        gbn.fill_window(&mut w);
        gbn.on_ack(&mut w, 1);
        assert_eq!(gbn.on_nack(&mut w, 2), vec![2, 3, 4]);
        assert!(gbn.timer().is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_retransmits_entire_window() {
        let (mut gbn, mut w) = setup(32, 4);
        gbn.fill_window(&mut w);
        gbn.on_ack(&mut w, 0);

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(gbn.on_timeout(&mut w).is_empty(), "not yet expired");

        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(gbn.on_timeout(&mut w), vec![1, 2, 3]);
        assert!(gbn.on_timeout(&mut w).is_empty(), "timer was restarted");
    }

    #[tokio::test(start_paused = true)]
    async fn ack_restarts_timer_from_now() {
        let (mut gbn, mut w) = setup(32, 5);
        gbn.fill_window(&mut w);
        tokio::time::advance(Duration::from_millis(900)).await;
        gbn.on_ack(&mut w, 0);
        tokio::time::advance(Duration::from_millis(900)).await;
        assert!(gbn.on_timeout(&mut w).is_empty());
        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(gbn.on_timeout(&mut w), vec![1, 2, 3, 4]);
    }

    #[test]
    fn window_bound_holds_throughout() {
        let (mut gbn, mut w) = setup(48, 3);
        let mut acked = 0u16;
        while !w.is_complete() {
            gbn.fill_window(&mut w);
            assert!(w.in_flight() <= w.window_size() as u16);
            gbn.on_ack(&mut w, acked);
            acked += 1;
        }
        assert_eq!(acked, 12);
    }
}
