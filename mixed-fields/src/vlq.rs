//! Variable-length unsigned integers used for payload lengths.
//!
//! Each byte carries 7 bits of the value, least-significant group first. The
//! high bit is set on every byte except the last. Encoding is minimal, so zero
//! is the single byte `0x00` and no value ends in a redundant zero group.

use std::io::{ErrorKind, Read};

use crate::error::{Error, FormatError};

const CONTINUATION: u8 = 0b1000_0000;
const GROUP_MASK: u8 = 0b0111_1111;
const GROUP_BITS: u32 = 7;

/// Longest encoding of a `u64`.
pub const MAX_ENCODED_LEN: usize = 10;

/// Number of bytes `encode(value)` produces.
#[inline]
pub fn encoded_len(value: u64) -> usize {
    let bits = u64::BITS - value.leading_zeros();
    std::cmp::max(1, ((bits + GROUP_BITS - 1) / GROUP_BITS) as usize)
}

/// Encode a value to a buffer.
///
/// Returns the number of bytes written.
pub fn encode_into(buf: &mut Vec<u8>, mut value: u64) -> usize {
    let start_len = buf.len();
    while value >= u64::from(CONTINUATION) {
        buf.push((value as u8 & GROUP_MASK) | CONTINUATION);
        value >>= GROUP_BITS;
    }
    buf.push(value as u8);
    buf.len() - start_len
}

/// Encode a value and return the bytes directly.
pub fn encode(value: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(encoded_len(value));
    encode_into(&mut buf, value);
    buf
}

#[derive(Default)]
struct Accumulator {
    value: u64,
    shift: u32,
}

impl Accumulator {
    /// Feed one byte. Returns the finished value once the final byte is seen.
    #[inline]
    fn push(&mut self, byte: u8) -> Result<Option<u64>, FormatError> {
        let group = u64::from(byte & GROUP_MASK);
        if self.shift >= u64::BITS || (group << self.shift) >> self.shift != group {
            return Err(FormatError::VarintOverflow);
        }
        self.value |= group << self.shift;

        if byte & CONTINUATION == 0 {
            return Ok(Some(self.value));
        }
        self.shift += GROUP_BITS;
        Ok(None)
    }
}

/// Decode a value from a byte slice.
///
/// Returns `(value, bytes_consumed)`.
pub fn parse(data: &[u8]) -> Result<(u64, usize), FormatError> {
    let mut acc = Accumulator::default();
    for (i, &byte) in data.iter().enumerate() {
        if let Some(value) = acc.push(byte)? {
            return Ok((value, i + 1));
        }
    }
    Err(FormatError::TruncatedVarint)
}

/// Decode a value from a stream, consuming exactly its encoded bytes.
pub fn decode<R: Read>(reader: &mut R) -> Result<u64, Error> {
    let mut acc = Accumulator::default();
    let mut byte = [0u8; 1];
    loop {
        match reader.read_exact(&mut byte) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                return Err(FormatError::TruncatedVarint.into())
            }
            Err(e) => return Err(e.into()),
        }
        if let Some(value) = acc.push(byte[0])? {
            return Ok(value);
        }
    }
}
