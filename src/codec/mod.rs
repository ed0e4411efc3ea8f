//! Self-delimiting integer codec.
//!
//! Integers are written as 7-bit groups, most significant group first. Every
//! byte except the last has its top bit clear; the last byte has its top bit
//! set, which makes the encoding self-delimiting without a length prefix.
//!
//! Signed values spend one bit of the terminal byte on the sign, so the
//! terminal byte carries 6 payload bits instead of 7:
//!
//! ```text
//! unsigned terminal:  1 v v v v v v v
//! signed terminal:    1 s v v v v v v
//! non-terminal:       0 v v v v v v v
//! ```
//!
//! Negative values are stored as their bitwise complement (`!n`), which keeps
//! small negative numbers as short as small positive ones.
//!
//! Code point sequences can additionally be delta-encoded against an anchor
//! that is recentered on the 128-value block of the previous code point; see
//! [`encode_code_points`].

pub mod encoding;

pub use self::encoding::{ByteEncoding, CharEncoder};

use thiserror::Error;

/// Bit that marks the last byte of an encoded integer.
const TERMINATOR: u8 = 0x80;

/// Sign bit inside the terminal byte of a signed integer.
const SIGN: u8 = 0x40;

/// Initial delta anchor: the middle of the first 128-value block.
pub const INITIAL_ANCHOR: u32 = 0x40;

/// Longest possible encoding of a 64-bit integer.
pub const MAX_ENCODED_LEN: usize = 10;

/// Errors raised while decoding byte streams.
///
/// A malformed stream is data corruption, never a normal outcome, so every
/// decoder reports it instead of guessing a value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The buffer ended before a terminal byte was found.
    #[error("truncated varint at byte {0}")]
    Truncated(usize),

    /// The encoded value does not fit in 64 bits.
    #[error("varint overflows 64 bits at byte {0}")]
    Overflow(usize),

    /// A decoded value is not a Unicode scalar value.
    #[error("invalid code point U+{0:X}")]
    InvalidCodePoint(u32),

    /// Decoded UTF-8 bytes were not valid UTF-8.
    #[error("invalid UTF-8 in key bytes")]
    InvalidUtf8,

    /// The persisted automaton names an unknown byte encoding.
    #[error("unknown byte encoding tag {0}")]
    UnknownEncoding(u8),

    /// A cell points at a row that is not strictly before its own row.
    #[error("row {row}: row offset {offset} does not point to an earlier row")]
    InvalidRowOffset {
        /// Row being decoded
        row: usize,
        /// Offending offset value
        offset: i64,
    },

    /// Cell bytes of a row were not strictly ascending.
    #[error("row {0}: cell bytes are not strictly ascending")]
    UnsortedRow(usize),

    /// A non-accepting cell without a target row.
    #[error("row {0}: non-accepting cell has no target")]
    DeadTransition(usize),

    /// Bytes left over after the last row.
    #[error("{0} trailing bytes after the last row")]
    TrailingBytes(usize),

    /// An accepting path whose accumulated key has no result entry.
    #[error("accumulated key {0} has no result entry")]
    MissingResult(i64),

    /// The automaton accepts a different number of keys than there are results.
    #[error("automaton accepts {paths} keys but {results} results are stored")]
    KeyCountMismatch {
        /// Accepting paths, saturated at `u64::MAX`
        paths: u64,
        /// Entries in the result table
        results: usize,
    },
}

/// A specialized `Result` type for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;

/// Append the encoding of an unsigned integer to `out`.
///
/// # Examples
///
/// ```
/// use statedict::codec::write_unsigned;
///
/// let mut out = Vec::new();
/// write_unsigned(0x80, &mut out);
/// assert_eq!(out, vec![0x01, 0x80]);
/// ```
pub fn write_unsigned(value: u64, out: &mut Vec<u8>) {
    let groups = group_count(value, 7);
    for i in (1..groups).rev() {
        out.push(((value >> (7 * i)) & 0x7F) as u8);
    }
    out.push(TERMINATOR | (value & 0x7F) as u8);
}

/// Append the encoding of a signed integer to `out`.
///
/// # Examples
///
/// ```
/// use statedict::codec::write_signed;
///
/// let mut out = Vec::new();
/// write_signed(-1, &mut out);
/// assert_eq!(out, vec![0xC0]);
/// ```
pub fn write_signed(value: i64, out: &mut Vec<u8>) {
    let (sign, magnitude) = if value < 0 {
        (SIGN, !value as u64)
    } else {
        (0, value as u64)
    };
    let rest = magnitude >> 6;
    if rest != 0 {
        let groups = group_count(rest, 7);
        for i in (0..groups).rev() {
            out.push(((rest >> (7 * i)) & 0x7F) as u8);
        }
    }
    out.push(TERMINATOR | sign | (magnitude & 0x3F) as u8);
}

/// Number of `bits`-wide groups needed for `value` (at least one).
fn group_count(value: u64, bits: u32) -> usize {
    let significant = 64 - value.leading_zeros();
    (significant.max(1)).div_ceil(bits) as usize
}

/// Decode an unsigned integer from the front of `bytes`.
///
/// Returns the value and the number of bytes consumed.
pub fn read_unsigned(bytes: &[u8]) -> Result<(u64, usize)> {
    let mut result: u64 = 0;
    for (i, &byte) in bytes.iter().enumerate() {
        if result >> 57 != 0 {
            return Err(CodecError::Overflow(i));
        }
        result = (result << 7) | u64::from(byte & 0x7F);
        if byte & TERMINATOR != 0 {
            return Ok((result, i + 1));
        }
    }
    Err(CodecError::Truncated(bytes.len()))
}

/// Decode a signed integer from the front of `bytes`.
///
/// Returns the value and the number of bytes consumed.
pub fn read_signed(bytes: &[u8]) -> Result<(i64, usize)> {
    let mut result: u64 = 0;
    for (i, &byte) in bytes.iter().enumerate() {
        if byte & TERMINATOR == 0 {
            if result >> 57 != 0 {
                return Err(CodecError::Overflow(i));
            }
            result = (result << 7) | u64::from(byte);
            continue;
        }
        // The magnitude must stay within 63 bits so the sign survives.
        if result >> 57 != 0 {
            return Err(CodecError::Overflow(i));
        }
        let magnitude = ((result << 6) | u64::from(byte & 0x3F)) as i64;
        let value = if byte & SIGN != 0 {
            !magnitude
        } else {
            magnitude
        };
        return Ok((value, i + 1));
    }
    Err(CodecError::Truncated(bytes.len()))
}

/// Encoded length of an unsigned integer, without encoding it.
pub fn unsigned_len(value: u64) -> usize {
    group_count(value, 7)
}

/// Encoded length of a signed integer, without encoding it.
pub fn signed_len(value: i64) -> usize {
    let magnitude = if value < 0 { !value as u64 } else { value as u64 };
    match magnitude >> 6 {
        0 => 1,
        rest => 1 + group_count(rest, 7),
    }
}

/// Recenter the delta anchor on the 128-value block of `code_point`.
#[inline]
pub fn recenter(code_point: u32) -> u32 {
    (code_point & !0x7F) | 0x40
}

/// Encode a sequence of code points.
///
/// Without `delta`, every code point is written with [`write_unsigned`].
/// With `delta`, every code point is written as the signed difference from an
/// anchor that starts at [`INITIAL_ANCHOR`] and is recentered on each code
/// point's 128-value block, so runs of text from one script mostly cost a
/// single byte per character.
///
/// # Examples
///
/// ```
/// use statedict::codec::{decode_code_points, encode_code_points};
///
/// let greek: Vec<u32> = "αβγ".chars().map(u32::from).collect();
/// let bytes = encode_code_points(&greek, true);
/// assert_eq!(bytes.len(), 4); // one two-byte jump, then single bytes
/// assert_eq!(decode_code_points(&bytes, true).unwrap(), greek);
/// ```
pub fn encode_code_points(code_points: &[u32], delta: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(code_points.len() * 2);
    let mut anchor = INITIAL_ANCHOR;
    for &cp in code_points {
        if delta {
            write_signed(i64::from(cp) - i64::from(anchor), &mut out);
            anchor = recenter(cp);
        } else {
            write_unsigned(u64::from(cp), &mut out);
        }
    }
    out
}

/// Decode a sequence produced by [`encode_code_points`] with the same `delta`.
pub fn decode_code_points(bytes: &[u8], delta: bool) -> Result<Vec<u32>> {
    let mut code_points = Vec::new();
    let mut anchor = INITIAL_ANCHOR;
    let mut pos = 0;
    while pos < bytes.len() {
        let (cp, used) = if delta {
            let (diff, used) = read_signed(&bytes[pos..]).map_err(|e| shift(e, pos))?;
            let cp = i64::from(anchor)
                .checked_add(diff)
                .ok_or(CodecError::Overflow(pos))?;
            let cp = u32::try_from(cp).map_err(|_| CodecError::InvalidCodePoint(cp as u32))?;
            anchor = recenter(cp);
            (cp, used)
        } else {
            let (value, used) = read_unsigned(&bytes[pos..]).map_err(|e| shift(e, pos))?;
            let cp =
                u32::try_from(value).map_err(|_| CodecError::InvalidCodePoint(value as u32))?;
            (cp, used)
        };
        code_points.push(cp);
        pos += used;
    }
    Ok(code_points)
}

/// Rebase a byte position reported for a sub-slice onto the whole buffer.
fn shift(error: CodecError, base: usize) -> CodecError {
    match error {
        CodecError::Truncated(at) => CodecError::Truncated(base + at),
        CodecError::Overflow(at) => CodecError::Overflow(base + at),
        other => other,
    }
}
