//! Retransmission timer management.
//!
//! Reliable delivery requires that unacknowledged frames are re-sent if no
//! ACK arrives within a bounded time.  This module provides:
//! - [`TimerConfig`]: the fixed retransmission timeout (RTO) and the
//!   polling granularity of the driver loops.
//! - [`BaseTimer`]: the single timer Go-Back-N keeps on the oldest
//!   unacknowledged frame.
//! - [`PacketTimers`]: one timer per outstanding frame for Selective Repeat.
//!
//! The RTO is fixed; there is no RTT estimation or back-off.  Every start
//! or restart reads [`Instant::now`] at that moment, never a cached value.
//! Instants come from `tokio::time`, which is monotonic and can be paused
//! and advanced in tests.

use std::collections::BTreeMap;
use std::ops::Range;
use std::time::Duration;

use tokio::time::Instant;

/// Timing parameters for one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    /// Retransmission timeout for both disciplines.
    pub rto: Duration,
    /// Longest the sender blocks waiting for a control frame before it
    /// re-checks its timers.  Must stay well below `rto`.
    pub poll_interval: Duration,
    /// Quiet period the sender waits for replies to frames that were still
    /// in flight when a transfer completed.
    pub linger: Duration,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            rto: Duration::from_millis(1000),
            poll_interval: Duration::from_millis(150),
            linger: Duration::from_millis(150),
        }
    }
}

impl TimerConfig {
    /// Config with the given RTO; the poll interval is kept at or below a
    /// sixth of it.
    pub fn with_rto(rto: Duration) -> Self {
        let base = Self::default();
        Self {
            rto,
            poll_interval: base.poll_interval.min(rto / 6),
            linger: base.linger,
        }
    }
}

/// Single Go-Back-N timer covering the window base.
#[derive(Debug, Clone)]
pub struct BaseTimer {
    rto: Duration,
    started: Option<Instant>,
}

impl BaseTimer {
    pub fn new(rto: Duration) -> Self {
        Self { rto, started: None }
    }

    /// (Re)start the timer from the current instant.
    pub fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    pub fn stop(&mut self) {
        self.started = None;
    }

    pub fn is_running(&self) -> bool {
        self.started.is_some()
    }

    /// `true` when running and at least one RTO has elapsed since start.
    pub fn expired(&self) -> bool {
        self.started
            .is_some_and(|started| started.elapsed() >= self.rto)
    }
}

/// Per-frame Selective Repeat timers, keyed by sequence number.
#[derive(Debug, Clone)]
pub struct PacketTimers {
    rto: Duration,
    sent_at: BTreeMap<u16, Instant>,
}

impl PacketTimers {
    pub fn new(rto: Duration) -> Self {
        Self {
            rto,
            sent_at: BTreeMap::new(),
        }
    }

    /// (Re)arm the timer for `seq` from the current instant.
    pub fn arm(&mut self, seq: u16) {
        self.sent_at.insert(seq, Instant::now());
    }

    pub fn disarm(&mut self, seq: u16) {
        self.sent_at.remove(&seq);
    }

    pub fn is_armed(&self, seq: u16) -> bool {
        self.sent_at.contains_key(&seq)
    }

    /// Armed sequences inside `range` whose RTO has elapsed, ascending.
    pub fn expired(&self, range: Range<u16>) -> Vec<u16> {
        let now = Instant::now();
        self.sent_at
            .range(range)
            .filter(|(_, sent)| now.duration_since(**sent) >= self.rto)
            .map(|(seq, _)| *seq)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RTO: Duration = Duration::from_millis(1000);

    #[test]
    fn default_poll_is_well_below_rto() {
        let cfg = TimerConfig::default();
        assert!(cfg.poll_interval * 4 < cfg.rto);
        let short = TimerConfig::with_rto(Duration::from_millis(300));
        assert_eq!(short.poll_interval, Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn base_timer_expires_after_rto() {
        let mut t = BaseTimer::new(RTO);
        assert!(!t.expired(), "stopped timer never expires");

        t.start();
        tokio::time::advance(Duration::from_millis(999)).await;
        assert!(!t.expired());
        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(t.expired());

        t.stop();
        assert!(!t.is_running());
        assert!(!t.expired());
    }

    #[tokio::test(start_paused = true)]
    async fn base_timer_restart_rereads_clock() {
        let mut t = BaseTimer::new(RTO);
        t.start();
        tokio::time::advance(Duration::from_millis(800)).await;
        t.start();
        tokio::time::advance(Duration::from_millis(800)).await;
        assert!(!t.expired(), "restart must count from the restart instant");
    }

    #[tokio::test(start_paused = true)]
    async fn packet_timers_expire_independently() {
        let mut timers = PacketTimers::new(RTO);
        timers.arm(0);
        tokio::time::advance(Duration::from_millis(500)).await;
        timers.arm(1);
        tokio::time::advance(Duration::from_millis(500)).await;

        assert_eq!(timers.expired(0..5), vec![0]);

        timers.arm(0);
        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(timers.expired(0..5), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn packet_timers_respect_window_range() {
        let mut timers = PacketTimers::new(RTO);
        for seq in 0..4 {
            timers.arm(seq);
        }
        timers.disarm(1);
        tokio::time::advance(RTO).await;
        assert_eq!(timers.expired(1..3), vec![2]);
        assert!(!timers.is_armed(1));
    }
}
