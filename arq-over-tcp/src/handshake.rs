//! Session-start negotiation.
//!
//! ```text
//!  sender                                   receiver
//!    │  REQ:<MODE>:<MIN>-<MAX>\n               │
//!    │────────────────────────────────────────▶│
//!    │  OK:<MODE>:<MIN>-<MAX>:W<w>:M<m>\n      │
//!    │◀────────────────────────────────────────│
//! ```
//!
//! The receiver is authoritative for the window size.  A mode it does not
//! recognise is replaced by GBN; the sender refuses a confirmation whose
//! mode differs from the one it asked for.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{ArqError, HandshakeError};
use crate::link::FrameLink;
use crate::session::{Mode, SessionConfig};

/// Longest handshake line accepted from the peer.
pub const MAX_LINE: usize = 128;

/// The sender's `REQ` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    /// `None` when the requested mode name was not recognised.
    pub mode: Option<Mode>,
    pub min_len: u16,
    pub max_len: u16,
}

impl Proposal {
    pub fn new(mode: Mode, min_len: u16, max_len: u16) -> Self {
        Self {
            mode: Some(mode),
            min_len,
            max_len,
        }
    }

    pub fn to_line(&self) -> String {
        let mode = self.mode.map_or("?", Mode::as_str);
        format!("REQ:{mode}:{}-{}", self.min_len, self.max_len)
    }

    pub fn parse(line: &str) -> Result<Self, HandshakeError> {
        let malformed = || HandshakeError::Malformed(line.to_string());

        let rest = line.trim().strip_prefix("REQ:").ok_or_else(malformed)?;
        let (mode, range) = rest.split_once(':').ok_or_else(malformed)?;
        let (min_len, max_len) = parse_range(range).ok_or_else(malformed)?;
        Ok(Self {
            mode: mode.parse().ok(),
            min_len,
            max_len,
        })
    }
}

/// The receiver's `OK` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    pub config: SessionConfig,
}

impl Confirmation {
    pub fn to_line(&self) -> String {
        let c = &self.config;
        format!(
            "OK:{}:{}-{}:W{}:M{}",
            c.mode,
            c.min_len,
            c.max_len,
            c.window_size,
            c.mode.ack_mode()
        )
    }

    /// Parse and cross-check an `OK` line.
    ///
    /// The textual mode and the `M` byte must name the same discipline.
    pub fn parse(line: &str) -> Result<Self, HandshakeError> {
        let malformed = || HandshakeError::Malformed(line.to_string());

        let fields: Vec<&str> = line.trim().split(':').collect();
        let [tag, mode, range, window, ack_mode] = fields.as_slice() else {
            return Err(malformed());
        };
        if *tag != "OK" {
            return Err(malformed());
        }

        let mode: Mode = mode.parse().map_err(|_| malformed())?;
        let (min_len, max_len) = parse_range(range).ok_or_else(malformed)?;
        let window: u8 = window
            .strip_prefix('W')
            .and_then(|w| w.parse().ok())
            .ok_or_else(malformed)?;
        let ack_mode = ack_mode
            .strip_prefix('M')
            .and_then(|m| m.parse::<u8>().ok())
            .and_then(Mode::from_ack_mode)
            .ok_or_else(malformed)?;
        if ack_mode != mode {
            return Err(HandshakeError::Malformed(format!(
                "{line:?}: mode {mode} disagrees with ack mode {}",
                ack_mode.ack_mode()
            )));
        }

        Ok(Self {
            config: SessionConfig::new(mode, window, min_len, max_len),
        })
    }
}

fn parse_range(range: &str) -> Option<(u16, u16)> {
    let (min, max) = range.split_once('-')?;
    Some((min.trim().parse().ok()?, max.trim().parse().ok()?))
}

/// Sender half: propose `mode` and the length range, and return the
/// session the receiver confirmed.
pub async fn propose<S>(
    link: &mut FrameLink<S>,
    mode: Mode,
    min_len: u16,
    max_len: u16,
) -> Result<SessionConfig, ArqError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let proposal = Proposal::new(mode, min_len, max_len);
    link.send_line(&proposal.to_line()).await?;
    log::debug!("[handshake] → {}", proposal.to_line());

    let line = link.read_line(MAX_LINE).await?;
    log::debug!("[handshake] ← {line}");
    let confirmation = Confirmation::parse(&line)?;

    let confirmed = confirmation.config.mode;
    if confirmed != mode {
        return Err(HandshakeError::ModeMismatch {
            requested: mode,
            confirmed,
        }
        .into());
    }
    Ok(confirmation.config)
}

/// Receiver half: read a proposal, fix the session with our `window_size`,
/// and confirm it.
pub async fn respond<S>(link: &mut FrameLink<S>, window_size: u8) -> Result<SessionConfig, ArqError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let line = link.read_line(MAX_LINE).await?;
    log::debug!("[handshake] ← {line}");
    let proposal = Proposal::parse(&line)?;

    let mode = proposal.mode.unwrap_or_else(|| {
        log::warn!("[handshake] unrecognised mode in {line:?}; using GBN");
        Mode::GoBackN
    });
    let config = SessionConfig::new(mode, window_size, proposal.min_len, proposal.max_len);

    let reply = Confirmation { config }.to_line();
    link.send_line(&reply).await?;
    log::debug!("[handshake] → {reply}");
    Ok(config)
}
