//! Receiving endpoint: handshake + per-message reassembly.
//!
//! [`ArqReceiver::recv_message`] reads a length prefix, then feeds DATA
//! frames to the session's [`Reassembly`] until it reports completion,
//! writing one ACK/NACK per frame that is not dropped by fault injection.
//!
//! The finished reassembly of the previous message is kept.  DATA frames
//! that show up while waiting for the next length prefix are stragglers
//! (retransmissions that crossed the completion point) and are answered
//! from that finished state.  A frame with a foreign tag is noise wherever
//! it appears.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::codec::{ControlFrame, DataFrame};
use crate::error::{ArqError, FrameError};
use crate::fault::{FaultInjector, FaultPlan, InboundFault};
use crate::handshake;
use crate::link::FrameLink;
use crate::reassembly::{reassembly_for, Outcome, Reassembly, Reply};
use crate::session::{clamp_window, SessionConfig};

/// Per-message receive counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiveStats {
    pub accepted: u32,
    pub buffered: u32,
    pub duplicates: u32,
    pub out_of_order: u32,
    pub corrupted: u32,
    /// Frames ignored by an injected receive-side drop.
    pub dropped: u32,
    /// Frames with a foreign type tag.
    pub noise: u32,
    pub acks_sent: u32,
    pub nacks_sent: u32,
    /// Sequence of every NACK sent, in order.
    pub nacked: Vec<u16>,
    /// Frames of the previous message answered before this one began.
    pub stragglers: u32,
}

impl ReceiveStats {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Accepted => self.accepted += 1,
            Outcome::Buffered => self.buffered += 1,
            Outcome::Duplicate => self.duplicates += 1,
            Outcome::OutOfOrder => self.out_of_order += 1,
            Outcome::Corrupted => self.corrupted += 1,
        }
    }

    fn record_reply(&mut self, reply: Reply) {
        match reply {
            Reply::Ack(_) => self.acks_sent += 1,
            Reply::Nack(seq) => {
                self.nacks_sent += 1;
                self.nacked.push(seq);
            }
        }
    }
}

/// One reassembled message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub payload: Vec<u8>,
    /// Length announced by the sender's prefix.
    pub announced_len: u16,
    pub stats: ReceiveStats,
}

impl ReceivedMessage {
    /// The payload as text, when it is valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

/// The receiving side of one connection.
#[derive(Debug)]
pub struct ArqReceiver<S> {
    link: FrameLink<S>,
    config: SessionConfig,
    faults: FaultInjector,
    /// Reassembly of the last completed message.
    finished: Option<Box<dyn Reassembly>>,
}

impl<S> ArqReceiver<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Answer the sender's handshake over `stream`, advertising
    /// `window_size`.
    pub async fn accept(stream: S, window_size: u8, faults: FaultPlan) -> Result<Self, ArqError> {
        let mut link = FrameLink::new(stream);
        let config = handshake::respond(&mut link, window_size).await?;
        log::info!(
            "[rx:{}] session up: window={} length={}..={}",
            config.mode,
            config.window_size,
            config.min_len,
            config.max_len
        );
        Ok(Self {
            link,
            config,
            faults: FaultInjector::new(faults),
            finished: None,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Change the window advertised on every following ACK/NACK.
    pub fn set_window_size(&mut self, window_size: u8) {
        self.config.window_size = clamp_window(window_size);
        log::info!(
            "[rx:{}] advertising window {}",
            self.config.mode,
            self.config.window_size
        );
    }

    /// Receive the next message.
    ///
    /// Returns `Ok(None)` when the sender closes the stream between
    /// messages.
    pub async fn recv_message(&mut self) -> Result<Option<ReceivedMessage>, ArqError> {
        let mut stats = ReceiveStats::default();

        let announced_len = loop {
            match self.link.peek().await {
                Err(ArqError::TransportClosed) => return Ok(None),
                Err(e) => return Err(e),
                Ok(byte) if byte.is_ascii_digit() => {
                    break self.link.read_length_prefix().await?;
                }
                Ok(_) => self.between_messages(&mut stats).await?,
            }
        };
        log::info!("[rx:{}] incoming message of {announced_len} bytes", self.config.mode);

        let mut state = reassembly_for(self.config.mode);
        while !state.is_complete() {
            let frame = match self.link.recv_data().await {
                Ok(frame) => frame,
                Err(ArqError::Framing(FrameError::UnknownTag(tag))) => {
                    stats.noise += 1;
                    log::debug!("[rx:{}] discarding frame with tag 0x{tag:02x}", self.config.mode);
                    continue;
                }
                Err(e) => return Err(e),
            };
            self.handle(state.as_mut(), &frame, &mut stats).await?;

            let received = state.delivered().len();
            if received > usize::from(self.config.max_len) {
                log::warn!(
                    "[rx:{}] no LAST fragment after {received} bytes; aborting",
                    self.config.mode
                );
                return Err(FrameError::Overrun {
                    max: self.config.max_len,
                    received,
                }
                .into());
            }
        }

        let payload = state.take_payload();
        self.finished = Some(state);

        if payload.len() != announced_len as usize {
            log::warn!(
                "[rx:{}] announced {announced_len} bytes but reassembled {}",
                self.config.mode,
                payload.len()
            );
        }
        log::info!(
            "[rx:{}] message complete: {} bytes, {} NACK(s) sent",
            self.config.mode,
            payload.len(),
            stats.nacks_sent
        );
        Ok(Some(ReceivedMessage {
            payload,
            announced_len,
            stats,
        }))
    }

    pub fn into_inner(self) -> S {
        self.link.into_inner()
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Apply fault injection, run the frame through `state` and reply.
    async fn handle(
        &mut self,
        state: &mut dyn Reassembly,
        frame: &DataFrame,
        stats: &mut ReceiveStats,
    ) -> Result<(), ArqError> {
        let seq = frame.header.seq;
        let verdict = match self.faults.inbound(seq) {
            InboundFault::Drop => {
                stats.dropped += 1;
                return Ok(());
            }
            InboundFault::Corrupt => state.on_corrupt(seq),
            InboundFault::Deliver if !frame.verify() => state.on_corrupt(seq),
            InboundFault::Deliver => state.on_frame(frame),
        };
        stats.record(verdict.outcome);

        if let Some(delay) = self.faults.ack_delay(seq) {
            log::debug!("[rx:{}] holding reply to seq={seq} for {delay:?}", self.config.mode);
            tokio::time::sleep(delay).await;
        }

        let reply = ControlFrame {
            kind: verdict.reply.kind(),
            seq: verdict.reply.seq(),
            window: self.config.window_size,
            mode: self.config.mode.ack_mode(),
        };
        self.link.send_control(&reply).await?;
        stats.record_reply(verdict.reply);
        log::debug!(
            "[rx:{}] ← DATA seq={seq} {:?}; → {}",
            self.config.mode,
            verdict.outcome,
            verdict.reply
        );
        Ok(())
    }

    /// Read a frame that arrived before the next length prefix.
    ///
    /// DATA frames belong to the previous message and are answered from its
    /// finished reassembly; anything else is discarded as noise.
    async fn between_messages(&mut self, stats: &mut ReceiveStats) -> Result<(), ArqError> {
        let frame = match self.link.recv_data().await {
            Ok(frame) => frame,
            Err(ArqError::Framing(FrameError::UnknownTag(tag))) => {
                stats.noise += 1;
                log::debug!(
                    "[rx:{}] discarding frame with tag 0x{tag:02x} between messages",
                    self.config.mode
                );
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let Some(mut state) = self.finished.take() else {
            log::warn!(
                "[rx:{}] DATA seq={} before any length prefix; discarded",
                self.config.mode,
                frame.header.seq
            );
            stats.noise += 1;
            return Ok(());
        };
        stats.stragglers += 1;
        let mut straggler_stats = ReceiveStats::default();
        let result = self.handle(state.as_mut(), &frame, &mut straggler_stats).await;
        self.finished = Some(state);
        result
    }
}
