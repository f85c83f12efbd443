//! Wire-format definitions for DATA and control frames.
//!
//! This module is responsible for:
//! - Defining the on-wire binary layout of both frame kinds.
//! - Serialising frames into byte buffers ready for the stream.
//! - Parsing raw bytes back into frames, reporting truncation as an error.
//!
//! No I/O happens here; this is pure data transformation.  Checksum
//! verification is *not* part of decoding: a frame whose CRC
//! does not match still parses, and [`DataFrame::verify`] tells the receiver
//! to NACK it.
//!
//! # Wire format
//!
//! All multi-byte integers are **big-endian**.
//!
//! ```text
//! DATA (11-byte header + payload)
//! +------+-----------+-----------+-------+-------------+-----------------+---------+
//! | 'D'  |    seq    | total_len | flags | payload_len |      crc32      | payload |
//! |  1B  |    2B     |    2B     |  1B   |     1B      |       4B        |   ...   |
//! +------+-----------+-----------+-------+-------------+-----------------+---------+
//!
//! CONTROL (5 bytes)
//! +----------+-----------+--------+------+
//! | 'K'/'N'  |    seq    | window | mode |
//! |    1B    |    2B     |   1B   |  1B  |
//! +----------+-----------+--------+------+
//! ```
//!
//! The CRC-32 covers the DATA header with the checksum field zeroed,
//! followed by the payload.

use crate::error::FrameError;

/// Type tag of a DATA frame.
pub const TAG_DATA: u8 = b'D';
/// Type tag of a positive acknowledgement.
pub const TAG_ACK: u8 = b'K';
/// Type tag of a negative acknowledgement.
pub const TAG_NACK: u8 = b'N';

/// Bit-flag constants for the DATA `flags` field.
pub mod flags {
    /// Final fragment of the message.
    pub const LAST: u8 = 0b0000_0001;
}

/// Byte length of the fixed DATA header.
pub const DATA_HEADER_LEN: usize = 11;
/// Byte length of a control frame.
pub const CONTROL_LEN: usize = 5;

// Byte offsets within the DATA header.
const OFF_TAG: usize = 0;
const OFF_SEQ: usize = 1;
const OFF_TOTAL_LEN: usize = 3;
const OFF_FLAGS: usize = 5;
const OFF_PAYLOAD_LEN: usize = 6;
const OFF_CHECKSUM: usize = 7;

// Byte offsets within a control frame.
const OFF_CTL_SEQ: usize = 1;
const OFF_CTL_WINDOW: usize = 3;
const OFF_CTL_MODE: usize = 4;

/// Fixed-size DATA header, decoded before the payload is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataHeader {
    /// Raw type tag; anything other than [`TAG_DATA`] is noise.
    pub tag: u8,
    pub seq: u16,
    /// Length of the whole message this fragment belongs to.
    pub total_len: u16,
    /// Bitmask of [`flags`] constants.
    pub flags: u8,
    pub payload_len: u8,
    /// CRC-32 as carried on the wire.
    pub checksum: u32,
}

impl DataHeader {
    /// Parse the fixed header.  The tag is not validated here.
    pub fn decode(buf: &[u8]) -> Result<Self, FrameError> {
        if buf.len() < DATA_HEADER_LEN {
            return Err(FrameError::Truncated {
                expected: DATA_HEADER_LEN,
                actual: buf.len(),
            });
        }
        Ok(Self {
            tag: buf[OFF_TAG],
            seq: u16::from_be_bytes([buf[OFF_SEQ], buf[OFF_SEQ + 1]]),
            total_len: u16::from_be_bytes([buf[OFF_TOTAL_LEN], buf[OFF_TOTAL_LEN + 1]]),
            flags: buf[OFF_FLAGS],
            payload_len: buf[OFF_PAYLOAD_LEN],
            checksum: u32::from_be_bytes([
                buf[OFF_CHECKSUM],
                buf[OFF_CHECKSUM + 1],
                buf[OFF_CHECKSUM + 2],
                buf[OFF_CHECKSUM + 3],
            ]),
        })
    }

    /// Total frame length implied by this header.
    pub fn frame_len(&self) -> usize {
        DATA_HEADER_LEN + self.payload_len as usize
    }
}

/// A complete DATA frame: header fields plus payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFrame {
    pub header: DataHeader,
    pub payload: Vec<u8>,
}

impl DataFrame {
    /// Parse a DATA frame from exactly one frame's worth of bytes.
    ///
    /// Returns [`Err`] if:
    /// - `buf` is shorter than [`DATA_HEADER_LEN`] or than the length the
    ///   header announces, or
    /// - the tag is not [`TAG_DATA`].
    ///
    /// A checksum mismatch is **not** an error; see [`DataFrame::verify`].
    pub fn decode(buf: &[u8]) -> Result<Self, FrameError> {
        let header = DataHeader::decode(buf)?;
        let frame_len = header.frame_len();
        if buf.len() < frame_len {
            return Err(FrameError::Truncated {
                expected: frame_len,
                actual: buf.len(),
            });
        }
        if header.tag != TAG_DATA {
            return Err(FrameError::UnknownTag(header.tag));
        }
        Ok(Self {
            header,
            payload: buf[DATA_HEADER_LEN..frame_len].to_vec(),
        })
    }

    /// `true` when the carried checksum matches the recomputed one.
    pub fn verify(&self) -> bool {
        data_checksum(
            self.header.seq,
            self.header.total_len,
            self.header.flags,
            &self.payload,
        ) == self.header.checksum
    }

    pub fn is_last(&self) -> bool {
        self.header.flags & flags::LAST != 0
    }
}

/// Serialise a DATA frame.
///
/// `payload` must fit the one-byte length field; fragments produced by
/// [`crate::fragment`] are at most four bytes.
pub fn encode_data(seq: u16, total_len: u16, frame_flags: u8, payload: &[u8]) -> Vec<u8> {
    debug_assert!(payload.len() <= u8::MAX as usize, "payload exceeds 255 bytes");
    let mut buf = vec![0u8; DATA_HEADER_LEN + payload.len()];
    write_data_header(&mut buf, seq, total_len, frame_flags, payload.len() as u8);
    buf[DATA_HEADER_LEN..].copy_from_slice(payload);

    let crc = crc32fast::hash(&buf);
    buf[OFF_CHECKSUM..OFF_CHECKSUM + 4].copy_from_slice(&crc.to_be_bytes());
    buf
}

/// Writes every header field with the checksum zeroed.
fn write_data_header(buf: &mut [u8], seq: u16, total_len: u16, frame_flags: u8, payload_len: u8) {
    buf[OFF_TAG] = TAG_DATA;
    buf[OFF_SEQ..OFF_SEQ + 2].copy_from_slice(&seq.to_be_bytes());
    buf[OFF_TOTAL_LEN..OFF_TOTAL_LEN + 2].copy_from_slice(&total_len.to_be_bytes());
    buf[OFF_FLAGS] = frame_flags;
    buf[OFF_PAYLOAD_LEN] = payload_len;
    buf[OFF_CHECKSUM..OFF_CHECKSUM + 4].copy_from_slice(&0u32.to_be_bytes());
}

/// CRC-32 of a DATA frame with the given fields (checksum field zeroed).
pub fn data_checksum(seq: u16, total_len: u16, frame_flags: u8, payload: &[u8]) -> u32 {
    let mut header = [0u8; DATA_HEADER_LEN];
    write_data_header(&mut header, seq, total_len, frame_flags, payload.len() as u8);
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&header);
    hasher.update(payload);
    hasher.finalize()
}

/// Kind of control frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Ack,
    Nack,
}

impl ControlKind {
    pub fn tag(self) -> u8 {
        match self {
            ControlKind::Ack => TAG_ACK,
            ControlKind::Nack => TAG_NACK,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            TAG_ACK => Some(ControlKind::Ack),
            TAG_NACK => Some(ControlKind::Nack),
            _ => None,
        }
    }
}

/// An ACK or NACK as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlFrame {
    pub kind: ControlKind,
    /// Cumulative sequence (GBN ACK) or the specific sequence (SR ACK, NACK).
    pub seq: u16,
    /// Receiver's current window; zero means "unchanged".
    pub window: u8,
    /// Echo of the session's ack mode (1 = GBN, 0 = SR).
    pub mode: u8,
}

impl ControlFrame {
    pub fn encode(&self) -> [u8; CONTROL_LEN] {
        encode_control(self.kind, self.seq, self.window, self.mode)
    }

    /// Parse a control frame from at least [`CONTROL_LEN`] bytes.
    pub fn decode(buf: &[u8]) -> Result<Self, FrameError> {
        if buf.len() < CONTROL_LEN {
            return Err(FrameError::Truncated {
                expected: CONTROL_LEN,
                actual: buf.len(),
            });
        }
        let kind = ControlKind::from_tag(buf[0]).ok_or(FrameError::UnknownTag(buf[0]))?;
        Ok(Self {
            kind,
            seq: u16::from_be_bytes([buf[OFF_CTL_SEQ], buf[OFF_CTL_SEQ + 1]]),
            window: buf[OFF_CTL_WINDOW],
            mode: buf[OFF_CTL_MODE],
        })
    }
}

/// Serialise a control frame.
pub fn encode_control(kind: ControlKind, seq: u16, window: u8, mode: u8) -> [u8; CONTROL_LEN] {
    let mut buf = [0u8; CONTROL_LEN];
    buf[0] = kind.tag();
    buf[OFF_CTL_SEQ..OFF_CTL_SEQ + 2].copy_from_slice(&seq.to_be_bytes());
    buf[OFF_CTL_WINDOW] = window;
    buf[OFF_CTL_MODE] = mode;
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_roundtrip_preserves_fields() {
        let bytes = encode_data(7, 32, flags::LAST, b"abcd");
        let frame = DataFrame::decode(&bytes).unwrap();
        assert_eq!(frame.header.tag, TAG_DATA);
        assert_eq!(frame.header.seq, 7);
        assert_eq!(frame.header.total_len, 32);
        assert!(frame.is_last());
        assert_eq!(frame.header.payload_len, 4);
        assert_eq!(frame.payload, b"abcd");
        assert!(frame.verify());
    }

    #[test]
    fn header_len_constant_is_correct() {
        // tag(1) + seq(2) + total_len(2) + flags(1) + payload_len(1) + crc(4) = 11
        assert_eq!(DATA_HEADER_LEN, 11);
        assert_eq!(encode_data(0, 0, 0, b"xy").len(), DATA_HEADER_LEN + 2);
    }

    #[test]
    fn fields_are_big_endian_on_wire() {
        let bytes = encode_data(0x0102, 0x0304, 0, b"");
        assert_eq!(bytes[OFF_TAG], b'D');
        assert_eq!(&bytes[OFF_SEQ..OFF_SEQ + 2], &[0x01, 0x02]);
        assert_eq!(&bytes[OFF_TOTAL_LEN..OFF_TOTAL_LEN + 2], &[0x03, 0x04]);
    }

    #[test]
    fn checksum_matches_zlib_crc32_over_zeroed_header() {
        let bytes = encode_data(3, 40, 0, b"hi!");
        let mut zeroed = bytes.clone();
        zeroed[OFF_CHECKSUM..OFF_CHECKSUM + 4].fill(0);
        let stored = u32::from_be_bytes(bytes[OFF_CHECKSUM..OFF_CHECKSUM + 4].try_into().unwrap());
        assert_eq!(stored, crc32fast::hash(&zeroed));
        assert_eq!(stored, data_checksum(3, 40, 0, b"hi!"));
    }

    #[test]
    fn payload_bit_flip_parses_but_fails_verify() {
        let mut bytes = encode_data(2, 30, 0, b"data");
        bytes[DATA_HEADER_LEN] ^= 0x01;
        let frame = DataFrame::decode(&bytes).expect("corrupt frame must still parse");
        assert_eq!(frame.header.seq, 2);
        assert!(!frame.verify());
    }

    #[test]
    fn header_corruption_fails_verify() {
        let mut bytes = encode_data(2, 30, 0, b"data");
        bytes[OFF_FLAGS] ^= flags::LAST;
        assert!(!DataFrame::decode(&bytes).unwrap().verify());
    }

    #[test]
    fn decode_short_header_returns_error() {
        assert_eq!(
            DataFrame::decode(&[TAG_DATA; DATA_HEADER_LEN - 1]),
            Err(FrameError::Truncated {
                expected: DATA_HEADER_LEN,
                actual: DATA_HEADER_LEN - 1
            })
        );
    }

    #[test]
    fn decode_truncated_payload_returns_error() {
        let mut bytes = encode_data(0, 30, 0, b"data");
        bytes.pop();
        assert_eq!(
            DataFrame::decode(&bytes),
            Err(FrameError::Truncated {
                expected: DATA_HEADER_LEN + 4,
                actual: DATA_HEADER_LEN + 3
            })
        );
    }

    #[test]
    fn decode_wrong_tag_is_reported_as_noise() {
        let mut bytes = encode_data(0, 30, 0, b"data");
        bytes[OFF_TAG] = b'X';
        assert_eq!(DataFrame::decode(&bytes), Err(FrameError::UnknownTag(b'X')));
        // The header itself still parses so the caller can skip the payload.
        assert_eq!(DataHeader::decode(&bytes).unwrap().payload_len, 4);
    }

    #[test]
    fn control_roundtrip() {
        let ack = ControlFrame {
            kind: ControlKind::Ack,
            seq: 7,
            window: 5,
            mode: 1,
        };
        let bytes = ack.encode();
        assert_eq!(bytes, [b'K', 0x00, 0x07, 5, 1]);
        assert_eq!(ControlFrame::decode(&bytes).unwrap(), ack);

        let nack = encode_control(ControlKind::Nack, 0x0203, 3, 0);
        assert_eq!(nack, [b'N', 0x02, 0x03, 3, 0]);
    }

    #[test]
    fn control_decode_errors() {
        assert_eq!(
            ControlFrame::decode(&[b'K', 0, 1]),
            Err(FrameError::Truncated {
                expected: CONTROL_LEN,
                actual: 3
            })
        );
        assert_eq!(
            ControlFrame::decode(&[b'Z', 0, 1, 5, 1]),
            Err(FrameError::UnknownTag(b'Z'))
        );
    }
}
