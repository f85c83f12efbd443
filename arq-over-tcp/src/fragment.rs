//! UTF-8-safe message fragmentation.
//!
//! A message is cut into fragments of at most [`FRAGMENT_SIZE`] bytes.  A cut
//! never lands inside a multi-byte character: when the naive slice does not
//! decode on its own it is shortened one byte at a time until it does, and
//! the next fragment starts at the shortened boundary.

use crate::codec::flags;
use crate::error::FragmentError;

/// Maximum payload bytes per DATA frame.
pub const FRAGMENT_SIZE: usize = 4;

/// One slice of an outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// 0-based position within the message.
    pub seq: u16,
    pub payload: Vec<u8>,
    /// Set only on the final fragment.
    pub last: bool,
}

impl Fragment {
    /// Value for the DATA frame `flags` field.
    pub fn flags(&self) -> u8 {
        if self.last {
            flags::LAST
        } else {
            0
        }
    }
}

/// Split `message` into fragments of at most `max_size` bytes.
///
/// An empty message yields no fragments.  Fails when some position in the
/// message has no decodable non-empty prefix (invalid UTF-8).
pub fn fragment(message: &[u8], max_size: usize) -> Result<Vec<Fragment>, FragmentError> {
    let max_size = max_size.max(1);
    let mut fragments = Vec::with_capacity(message.len().div_ceil(max_size));
    let mut offset = 0usize;

    while offset < message.len() {
        let end = (offset + max_size).min(message.len());
        let mut slice = &message[offset..end];
        while std::str::from_utf8(slice).is_err() {
            slice = &slice[..slice.len() - 1];
            if slice.is_empty() {
                return Err(FragmentError::Undecodable { offset });
            }
        }

        offset += slice.len();
        fragments.push(Fragment {
            seq: fragments.len() as u16,
            payload: slice.to_vec(),
            last: offset >= message.len(),
        });
    }

    Ok(fragments)
}
