//! `arq-over-tcp`: sliding-window ARQ (Go-Back-N and Selective Repeat)
//! layered over a reliable byte stream, with injectable faults so the
//! recovery paths can be exercised on a link that never loses anything.
//!
//! # Architecture
//!
//! ```text
//!  ┌───────────┐   DATA frames   ┌─────────────┐
//!  │ ArqSender │────────────────▶│ ArqReceiver │
//!  └─────┬─────┘                 └──────┬──────┘
//!        │        ACK / NACK            │
//!        │◀─────────────────────────────┘
//!        │
//!  ┌─────▼──────────────────────────────────────┐
//!  │  Discipline (GBN | SR)  ·  Reassembly      │
//!  │  SendWindow · timers · fault injector      │
//!  └─────┬──────────────────────────────────────┘
//!        │ length-prefixed frames
//!  ┌─────▼─────┐
//!  │ FrameLink │  (thin async wrapper around any AsyncRead + AsyncWrite)
//!  └───────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`codec`]        : DATA / ACK / NACK wire format and CRC-32
//! - [`fragment`]     : UTF-8-safe 4-byte fragmentation
//! - [`session`]      : negotiated mode, window and length bounds
//! - [`handshake`]    : `REQ` / `OK` session negotiation
//! - [`window`]       : shared send window and the `Discipline` trait
//! - [`gbn_sender`]   : Go-Back-N send rules (single base timer)
//! - [`sr_sender`]    : Selective Repeat send rules (per-frame timers)
//! - [`reassembly`]   : receive-side verdicts and the `Reassembly` trait
//! - [`gbn_receiver`] : Go-Back-N in-order acceptance
//! - [`sr_receiver`]  : Selective Repeat buffering and in-order drain
//! - [`timer`]        : retransmission timers on tokio's monotonic clock
//! - [`fault`]        : first-occurrence drop / corrupt / duplicate / delay
//! - [`link`]         : framed async stream I/O
//! - [`sender`]       : sending endpoint poll loop
//! - [`receiver`]     : receiving endpoint loop
//! - [`error`]        : error types

pub mod codec;
pub mod error;
pub mod fault;
pub mod fragment;
pub mod gbn_receiver;
pub mod gbn_sender;
pub mod handshake;
pub mod link;
pub mod reassembly;
pub mod receiver;
pub mod sender;
pub mod session;
pub mod sr_receiver;
pub mod sr_sender;
pub mod timer;
pub mod window;

pub use error::ArqError;
pub use fault::FaultPlan;
pub use receiver::{ArqReceiver, ReceivedMessage};
pub use sender::{ArqSender, SenderOptions, TransferReport};
pub use session::{Mode, SessionConfig};
pub use timer::TimerConfig;
