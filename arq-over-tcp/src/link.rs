//! Framed reader/writer over an async byte stream.
//!
//! [`FrameLink`] is a thin wrapper around any `AsyncRead + AsyncWrite`
//! stream (a `TcpStream` in production, `tokio::io::duplex` in tests) that
//! speaks frames, handshake lines and length prefixes instead of raw bytes.
//! All protocol logic lives elsewhere; this module owns only byte I/O.
//!
//! Stream boundaries carry no meaning: every read first gathers the fixed
//! header, then exactly the number of payload bytes the header announces.
//! Bytes are accumulated in an internal buffer, so a read abandoned by a
//! timeout never loses a partially received frame.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use crate::codec::{ControlFrame, DataFrame, DataHeader, CONTROL_LEN, DATA_HEADER_LEN};
use crate::error::{ArqError, FrameError, HandshakeError};

/// Bytes requested from the stream per read call.
const READ_CHUNK: usize = 512;

/// Errors that mean the peer has gone away map to
/// [`ArqError::TransportClosed`]; anything else stays an I/O error.
fn transport_error(e: io::Error) -> ArqError {
    match e.kind() {
        io::ErrorKind::BrokenPipe
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::UnexpectedEof => ArqError::TransportClosed,
        _ => ArqError::Io(e),
    }
}

/// A frame-oriented view of a byte stream.
#[derive(Debug)]
pub struct FrameLink<S> {
    stream: S,
    /// Bytes read from the stream but not yet consumed.
    pending: Vec<u8>,
}

impl<S> FrameLink<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            pending: Vec::with_capacity(READ_CHUNK),
        }
    }

    /// Give back the stream.  Unconsumed buffered bytes are discarded.
    pub fn into_inner(self) -> S {
        self.stream
    }

    // -----------------------------------------------------------------------
    // Reading
    // -----------------------------------------------------------------------

    /// Buffer at least `n` bytes.
    ///
    /// EOF with nothing buffered is [`ArqError::TransportClosed`]; EOF in
    /// the middle of a frame is a truncation error.  Cancel-safe.
    async fn fill(&mut self, n: usize) -> Result<(), ArqError> {
        let mut chunk = [0u8; READ_CHUNK];
        while self.pending.len() < n {
            let read = self.stream.read(&mut chunk).await.map_err(transport_error)?;
            if read == 0 {
                if self.pending.is_empty() {
                    return Err(ArqError::TransportClosed);
                }
                return Err(FrameError::Truncated {
                    expected: n,
                    actual: self.pending.len(),
                }
                .into());
            }
            self.pending.extend_from_slice(&chunk[..read]);
        }
        Ok(())
    }

    fn take(&mut self, n: usize) -> Vec<u8> {
        self.pending.drain(..n).collect()
    }

    /// Next unread byte, without consuming it.
    pub async fn peek(&mut self) -> Result<u8, ArqError> {
        self.fill(1).await?;
        Ok(self.pending[0])
    }

    /// Read one DATA frame: the fixed header, then exactly `payload_len`
    /// more bytes.
    ///
    /// A frame with a foreign tag is consumed whole and reported as
    /// [`FrameError::UnknownTag`], which callers treat as noise.
    pub async fn recv_data(&mut self) -> Result<DataFrame, ArqError> {
        self.fill(DATA_HEADER_LEN).await?;
        let header = DataHeader::decode(&self.pending[..DATA_HEADER_LEN])?;
        self.fill(header.frame_len()).await?;
        let bytes = self.take(header.frame_len());
        Ok(DataFrame::decode(&bytes)?)
    }

    /// Read one control frame, blocking until it arrives.
    pub async fn recv_control(&mut self) -> Result<ControlFrame, ArqError> {
        self.fill(CONTROL_LEN).await?;
        let bytes = self.take(CONTROL_LEN);
        Ok(ControlFrame::decode(&bytes)?)
    }

    /// Wait at most `wait` for a control frame.
    ///
    /// Returns `Ok(None)` when the wait elapses; any bytes of a partially
    /// received frame stay buffered for the next call.
    pub async fn poll_control(&mut self, wait: Duration) -> Result<Option<ControlFrame>, ArqError> {
        match timeout(wait, self.fill(CONTROL_LEN)).await {
            Err(_elapsed) => Ok(None),
            Ok(filled) => {
                filled?;
                let bytes = self.take(CONTROL_LEN);
                Ok(Some(ControlFrame::decode(&bytes)?))
            }
        }
    }

    /// Read a `\n`-terminated line of at most `max` bytes (terminator and
    /// trailing `\r` stripped).
    pub async fn read_line(&mut self, max: usize) -> Result<String, ArqError> {
        loop {
            if let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
                let raw = self.take(pos + 1);
                let line = String::from_utf8_lossy(&raw[..pos]);
                return Ok(line.trim_end_matches('\r').to_string());
            }
            if self.pending.len() >= max {
                return Err(HandshakeError::TooLong(max).into());
            }
            let want = self.pending.len() + 1;
            self.fill(want).await?;
        }
    }

    /// Read the two-digit ASCII length that precedes every message.
    pub async fn read_length_prefix(&mut self) -> Result<u16, ArqError> {
        self.fill(2).await?;
        let raw = self.take(2);
        let digits = [raw[0], raw[1]];
        if !digits.iter().all(u8::is_ascii_digit) {
            return Err(FrameError::BadLengthPrefix(digits).into());
        }
        Ok(u16::from(digits[0] - b'0') * 10 + u16::from(digits[1] - b'0'))
    }

    // -----------------------------------------------------------------------
    // Writing
    // -----------------------------------------------------------------------

    /// Write raw frame bytes and flush.
    pub async fn send(&mut self, bytes: &[u8]) -> Result<(), ArqError> {
        self.stream.write_all(bytes).await.map_err(transport_error)?;
        self.stream.flush().await.map_err(transport_error)
    }

    pub async fn send_control(&mut self, frame: &ControlFrame) -> Result<(), ArqError> {
        self.send(&frame.encode()).await
    }

    /// Write `line` followed by `\n`.
    pub async fn send_line(&mut self, line: &str) -> Result<(), ArqError> {
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
        self.send(&bytes).await
    }

    /// Write the zero-padded two-digit message length.
    pub async fn send_length_prefix(&mut self, len: u16) -> Result<(), ArqError> {
        debug_assert!(len <= 99, "length prefix holds two digits");
        self.send(format!("{len:02}").as_bytes()).await
    }

    /// Close the write half of the stream.
    pub async fn shutdown(&mut self) -> Result<(), ArqError> {
        self.stream.shutdown().await.map_err(transport_error)
    }
}
