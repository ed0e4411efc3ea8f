//! Per-character byte encodings.
//!
//! The automaton's alphabet is bytes, not characters. A [`ByteEncoding`]
//! decides how each character of a key (or of scanned text) becomes bytes.
//! Every encoding here is prefix-free per character, so an accepting
//! transition can only ever be taken on the last byte of a character.

use super::{
    decode_code_points, read_signed, read_unsigned, recenter, write_signed, write_unsigned,
    CodecError, Result, INITIAL_ANCHOR,
};

/// How characters are turned into automaton bytes.
///
/// # Examples
///
/// ```
/// use statedict::codec::ByteEncoding;
///
/// let encoding = ByteEncoding::CompactDelta;
/// let bytes = encoding.encode_str("many");
/// assert_eq!(bytes.len(), 4);
/// assert_eq!(encoding.decode_str(&bytes).unwrap(), "many");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum ByteEncoding {
    /// Plain UTF-8 bytes.
    Utf8,
    /// Each code point as an unsigned varint.
    Compact,
    /// Each code point as a signed varint delta from a recentering anchor.
    #[default]
    CompactDelta,
}

impl ByteEncoding {
    /// Tag byte used in the persisted automaton layout.
    pub fn tag(self) -> u8 {
        match self {
            ByteEncoding::Utf8 => 1,
            ByteEncoding::Compact => 2,
            ByteEncoding::CompactDelta => 3,
        }
    }

    /// Inverse of [`ByteEncoding::tag`].
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            1 => Ok(ByteEncoding::Utf8),
            2 => Ok(ByteEncoding::Compact),
            3 => Ok(ByteEncoding::CompactDelta),
            other => Err(CodecError::UnknownEncoding(other)),
        }
    }

    /// Maximum number of bytes a single code point can expand to.
    pub fn max_bytes_per_char(self) -> usize {
        match self {
            ByteEncoding::Utf8 => 4,
            // 21 bits in 7-bit groups
            ByteEncoding::Compact => 3,
            // |delta| needs up to 21 bits: 6 in the terminal byte, 15 before it
            ByteEncoding::CompactDelta => 4,
        }
    }

    /// Create a fresh encoder positioned at the start of a key.
    pub fn encoder(self) -> CharEncoder {
        CharEncoder::new(self)
    }

    /// Encode a whole string, starting from a fresh encoder.
    pub fn encode_str(self, text: &str) -> Vec<u8> {
        let mut encoder = self.encoder();
        let mut out = Vec::with_capacity(text.len());
        for ch in text.chars() {
            encoder.push_char(ch, &mut out);
        }
        out
    }

    /// Decode bytes produced by [`ByteEncoding::encode_str`] back to a string.
    pub fn decode_str(self, bytes: &[u8]) -> Result<String> {
        match self {
            ByteEncoding::Utf8 => {
                String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8)
            }
            ByteEncoding::Compact | ByteEncoding::CompactDelta => {
                let delta = self == ByteEncoding::CompactDelta;
                decode_code_points(bytes, delta)?
                    .into_iter()
                    .map(|cp| char::from_u32(cp).ok_or(CodecError::InvalidCodePoint(cp)))
                    .collect()
            }
        }
    }

    /// Length in bytes of the first character encoded in `bytes`.
    ///
    /// Used to split a key's byte string into per-character chunks.
    pub fn char_len(self, bytes: &[u8]) -> Result<usize> {
        match self {
            ByteEncoding::Utf8 => {
                let first = *bytes.first().ok_or(CodecError::Truncated(0))?;
                let len = match first {
                    0x00..=0x7F => 1,
                    0xC0..=0xDF => 2,
                    0xE0..=0xEF => 3,
                    0xF0..=0xF7 => 4,
                    _ => return Err(CodecError::InvalidUtf8),
                };
                if bytes.len() < len {
                    return Err(CodecError::Truncated(bytes.len()));
                }
                Ok(len)
            }
            ByteEncoding::Compact => read_unsigned(bytes).map(|(_, used)| used),
            ByteEncoding::CompactDelta => read_signed(bytes).map(|(_, used)| used),
        }
    }
}

impl std::fmt::Display for ByteEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ByteEncoding::Utf8 => "utf8",
            ByteEncoding::Compact => "compact",
            ByteEncoding::CompactDelta => "compact-delta",
        };
        f.write_str(name)
    }
}

/// Stateful character-to-bytes converter.
///
/// Only [`ByteEncoding::CompactDelta`] carries state (the delta anchor), but
/// every caller goes through this type so the encodings stay interchangeable.
/// Call [`CharEncoder::reset`] whenever encoding restarts at a new key or
/// match offset.
#[derive(Debug, Clone)]
pub struct CharEncoder {
    encoding: ByteEncoding,
    anchor: u32,
}

impl CharEncoder {
    /// Create an encoder for `encoding`.
    pub fn new(encoding: ByteEncoding) -> Self {
        Self {
            encoding,
            anchor: INITIAL_ANCHOR,
        }
    }

    /// The encoding this encoder produces.
    pub fn encoding(&self) -> ByteEncoding {
        self.encoding
    }

    /// Forget all context; the next character starts a new sequence.
    pub fn reset(&mut self) {
        self.anchor = INITIAL_ANCHOR;
    }

    /// Append the bytes for `ch` to `out` and return how many were written.
    pub fn push_char(&mut self, ch: char, out: &mut Vec<u8>) -> usize {
        let start = out.len();
        match self.encoding {
            ByteEncoding::Utf8 => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            }
            ByteEncoding::Compact => write_unsigned(u64::from(ch), out),
            ByteEncoding::CompactDelta => {
                let cp = u32::from(ch);
                write_signed(i64::from(cp) - i64::from(self.anchor), out);
                self.anchor = recenter(cp);
            }
        }
        out.len() - start
    }
}
