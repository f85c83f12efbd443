//! Sending endpoint: handshake + windowed message transfer.
//!
//! # Architecture
//!
//! ```text
//!  Application
//!      │  send_message(bytes)
//!      ▼
//!  ArqSender ─────────────────────────────────────────────┐
//!    ├── SendWindow      (fragments, base, next_seq)      │
//!    ├── Box<dyn Discipline>  (GoBackN | SelectiveRepeat) │
//!    ├── FaultInjector   (outbound drop/corrupt/dup)      │
//!    └── FrameLink<S>    (DATA out, ACK/NACK in) ─────────┘
//! ```
//!
//! # Poll cycle
//!
//! One message at a time, on the caller's task:
//!
//! 1. fill the window and write every newly eligible frame;
//! 2. wait up to `poll_interval` for one control frame;
//! 3. on silence, ask the discipline which frames timed out and resend them;
//! 4. on ACK/NACK, apply any window update and let the discipline react.
//!
//! Repeat until the base reaches the fragment count, then linger briefly to
//! absorb replies to frames that were still in flight.
//!
//! ```ignore
//! let mut tx = ArqSender::connect(stream, SenderOptions::default()).await?;
//! let report = tx.send_message("Redes de computadores exigem paciencia!".as_bytes()).await?;
//! tx.close().await?;
//! ```

use tokio::io::{AsyncRead, AsyncWrite};

use crate::codec::{ControlFrame, ControlKind};
use crate::error::{ArqError, FrameError};
use crate::fault::{FaultInjector, FaultPlan};
use crate::fragment::{fragment, FRAGMENT_SIZE};
use crate::handshake;
use crate::link::FrameLink;
use crate::session::{Mode, SessionConfig};
use crate::timer::TimerConfig;
use crate::window::{discipline_for, Discipline, SendWindow};

// ---------------------------------------------------------------------------
// Options and report
// ---------------------------------------------------------------------------

/// What the sender asks for, plus its local timing and fault settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderOptions {
    pub mode: Mode,
    pub min_len: u16,
    pub max_len: u16,
    pub timers: TimerConfig,
    pub faults: FaultPlan,
}

impl Default for SenderOptions {
    fn default() -> Self {
        let session = SessionConfig::default();
        Self {
            mode: session.mode,
            min_len: session.min_len,
            max_len: session.max_len,
            timers: TimerConfig::default(),
            faults: FaultPlan::default(),
        }
    }
}

/// Counters for one completed message transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferReport {
    pub fragments: u16,
    /// DATA frames physically written, duplicates included.
    pub frames_written: u32,
    pub first_transmissions: u32,
    /// Every retransmitted sequence, in order, repeats included.
    pub retransmitted: Vec<u16>,
    /// Control frames read before completion.
    pub replies: u32,
    pub acks: u32,
    pub nacks: u32,
    /// Timer expiries that caused at least one retransmission.
    pub timeouts: u32,
    pub window_updates: u32,
    pub last_ack: Option<u16>,
    /// Control frames drained while lingering after completion.
    pub late_replies: u32,
    /// Highest `next_seq - base` observed right after a fill.
    pub max_in_flight: u16,
}

// ---------------------------------------------------------------------------
// ArqSender
// ---------------------------------------------------------------------------

/// The sending side of one connection.
#[derive(Debug)]
pub struct ArqSender<S> {
    link: FrameLink<S>,
    config: SessionConfig,
    timers: TimerConfig,
    faults: FaultInjector,
}

impl<S> ArqSender<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Run the handshake over `stream` and return a sender bound to the
    /// confirmed session.
    pub async fn connect(stream: S, options: SenderOptions) -> Result<Self, ArqError> {
        let mut link = FrameLink::new(stream);
        let config =
            handshake::propose(&mut link, options.mode, options.min_len, options.max_len).await?;
        log::info!(
            "[tx:{}] session up: window={} length={}..={}",
            config.mode,
            config.window_size,
            config.min_len,
            config.max_len
        );
        Ok(Self {
            link,
            config,
            timers: options.timers,
            faults: FaultInjector::new(options.faults),
        })
    }

    /// Current session parameters, including any window update received so
    /// far.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Deliver one message reliably.
    ///
    /// Fails with [`ArqError::MessageLength`] before anything is written
    /// when the length is outside the negotiated range.  Any other error
    /// leaves the connection unusable.
    pub async fn send_message(&mut self, message: &[u8]) -> Result<TransferReport, ArqError> {
        if !self.config.accepts_len(message.len()) {
            return Err(ArqError::MessageLength {
                len: message.len(),
                min: self.config.min_len,
                max: self.config.max_len,
            });
        }
        let total_len = message.len() as u16;
        let fragments = fragment(message, FRAGMENT_SIZE)?;

        let mut window = SendWindow::new(fragments, total_len, self.config.window_size);
        let mut discipline = discipline_for(self.config.mode, self.timers.rto);
        let mut report = TransferReport {
            fragments: window.fragment_count(),
            ..TransferReport::default()
        };

        self.link.send_length_prefix(total_len).await?;
        log::info!(
            "[tx:{}] sending {} bytes in {} fragment(s), window={}",
            self.config.mode,
            total_len,
            report.fragments,
            window.window_size()
        );

        while !window.is_complete() {
            let fresh = discipline.fill_window(&mut window);
            report.max_in_flight = report.max_in_flight.max(window.in_flight());
            self.transmit(&window, &fresh, false, &mut report).await?;

            match self.link.poll_control(self.timers.poll_interval).await {
                Ok(Some(control)) => {
                    report.replies += 1;
                    self.on_control(control, &mut window, discipline.as_mut(), &mut report)
                        .await?;
                }
                Ok(None) => {
                    let resend = discipline.on_timeout(&mut window);
                    if !resend.is_empty() {
                        report.timeouts += 1;
                        self.transmit(&window, &resend, true, &mut report).await?;
                    }
                }
                Err(ArqError::Framing(FrameError::UnknownTag(tag))) => {
                    report.replies += 1;
                    log::warn!(
                        "[tx:{}] discarding control frame with tag 0x{tag:02x}",
                        self.config.mode
                    );
                }
                Err(e) => return Err(e),
            }
        }

        self.linger(&mut report).await?;
        log::info!(
            "[tx:{}] message delivered: {} frame(s) written, {} retransmission(s)",
            self.config.mode,
            report.frames_written,
            report.retransmitted.len()
        );
        Ok(report)
    }

    /// Close the write half of the stream.
    pub async fn close(mut self) -> Result<(), ArqError> {
        self.link.shutdown().await
    }

    pub fn into_inner(self) -> S {
        self.link.into_inner()
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Write the frames for `seqs` through the fault injector.
    async fn transmit(
        &mut self,
        window: &SendWindow,
        seqs: &[u16],
        retransmission: bool,
        report: &mut TransferReport,
    ) -> Result<(), ArqError> {
        for &seq in seqs {
            let Some(frame) = window.frame(seq) else {
                continue;
            };
            for copy in self.faults.outbound(seq, frame) {
                self.link.send(&copy).await?;
                report.frames_written += 1;
            }
            if retransmission {
                report.retransmitted.push(seq);
                log::debug!("[tx:{}] → DATA seq={seq} (retransmit)", self.config.mode);
            } else {
                report.first_transmissions += 1;
                log::debug!(
                    "[tx:{}] → DATA seq={seq} in_flight={}",
                    self.config.mode,
                    window.in_flight()
                );
            }
        }
        Ok(())
    }

    async fn on_control(
        &mut self,
        control: ControlFrame,
        window: &mut SendWindow,
        discipline: &mut dyn Discipline,
        report: &mut TransferReport,
    ) -> Result<(), ArqError> {
        let mode = self.config.mode;

        if let Some(old) = self.config.update_window(control.window) {
            window.set_window_size(self.config.window_size);
            report.window_updates += 1;
            log::info!("[tx:{mode}] window {old} → {}", self.config.window_size);
        }
        if control.mode != mode.ack_mode() {
            log::warn!(
                "[tx:{mode}] peer echoed ack mode {} on {:?}({})",
                control.mode,
                control.kind,
                control.seq
            );
        }

        match control.kind {
            ControlKind::Ack => {
                report.acks += 1;
                report.last_ack = Some(control.seq);
                let slid = discipline.on_ack(window, control.seq);
                log::debug!(
                    "[tx:{mode}] ← ACK seq={} (acked {slid}) base={}",
                    control.seq,
                    window.base()
                );
            }
            ControlKind::Nack => {
                report.nacks += 1;
                let resend = discipline.on_nack(window, control.seq);
                self.transmit(window, &resend, true, report).await?;
            }
        }
        Ok(())
    }

    /// Drain replies to frames still in flight at completion, so they are
    /// not mistaken for replies to the next message.
    async fn linger(&mut self, report: &mut TransferReport) -> Result<(), ArqError> {
        let mut unanswered = report.frames_written.saturating_sub(report.replies);
        while unanswered > 0 {
            match self.link.poll_control(self.timers.linger).await {
                Ok(Some(control)) => {
                    log::trace!(
                        "[tx:{}] late {:?}({}) discarded",
                        self.config.mode,
                        control.kind,
                        control.seq
                    );
                }
                Err(ArqError::Framing(FrameError::UnknownTag(_))) => {}
                Ok(None) | Err(ArqError::TransportClosed) => break,
                Err(e) => return Err(e),
            }
            report.late_replies += 1;
            unanswered -= 1;
        }
        Ok(())
    }
}
