//! A lazily converted view of a text.
//!
//! [`ConvertedText`] applies the same rewriting as [`Matcher::convert`], but
//! only as far as a caller actually reads, and remembers where every
//! converted byte came from. A parser can work on the converted text and
//! still report positions in the original one.

use std::fmt;
use std::marker::PhantomData;
use std::ops::Range;

use super::{MatchFilter, MatchStatus, Matcher};

/// Text rewritten by a dictionary on demand, with a map back to the source.
///
/// Every longest match is replaced by its payload's `Display` form, and
/// characters that start no match are copied. Offsets on both sides are byte
/// offsets. Position `i` of the converted text maps to the end of the source
/// span that produced byte `i - 1`, so the end of each replacement maps to
/// the end of the key it replaced.
///
/// # Examples
///
/// ```
/// use statedict::prelude::*;
///
/// let dictionary = StateDictionary::from_pairs([("many", "Few"), ("manner", "Style")])?;
/// let mut text = dictionary.converted("many manners");
///
/// assert_eq!(text.get(0..3), Some("Few"));
/// assert_eq!(text.known_len(), 3);
/// assert_eq!(text.to_source_offset(3), Some(4));
///
/// assert_eq!(text.as_str(), "Few Styles");
/// assert_eq!(text.source_slice(4..9), Some("manner"));
/// # Ok::<(), statedict::dictionary::BuildError>(())
/// ```
pub struct ConvertedText<'d, V, M>
where
    V: 'd,
{
    matcher: M,
    buffer: String,
    /// Source offset for every converted offset `0..=buffer.len()`.
    source_offsets: Vec<usize>,
    _values: PhantomData<fn() -> &'d V>,
}

impl<'d, V, M> ConvertedText<'d, V, M>
where
    V: fmt::Display + 'd,
    M: Matcher<'d, V>,
{
    /// Convert the text of `matcher`, starting at its current offset.
    pub fn new(matcher: M) -> Self {
        let start = matcher.offset();
        Self {
            matcher,
            buffer: String::new(),
            source_offsets: vec![start],
            _values: PhantomData,
        }
    }

    /// The unconverted text.
    pub fn source(&self) -> &str {
        self.matcher.text()
    }

    /// Bytes converted so far.
    pub fn known_len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the whole source has been converted.
    pub fn is_complete(&self) -> bool {
        !self.matcher.has_more()
    }

    /// The converted text up to `range.end`, converting as needed.
    ///
    /// `None` if the range runs past the converted text or does not fall
    /// on character boundaries.
    pub fn get(&mut self, range: Range<usize>) -> Option<&str> {
        self.grow_to(range.end);
        self.buffer.get(range)
    }

    /// The character starting at converted offset `index`.
    pub fn char_at(&mut self, index: usize) -> Option<char> {
        self.grow_to(index + 1);
        self.buffer.get(index..)?.chars().next()
    }

    /// The whole converted text.
    pub fn as_str(&mut self) -> &str {
        while self.grow_one() {}
        &self.buffer
    }

    /// Source offset that converted offset `offset` maps to.
    pub fn to_source_offset(&mut self, offset: usize) -> Option<usize> {
        self.grow_to(offset);
        self.source_offsets.get(offset).copied()
    }

    /// Converted offset whose source position is `source`.
    ///
    /// `Ok` holds the last converted offset mapping exactly to `source`.
    /// `Err` holds the first converted offset mapping past it, which happens
    /// when `source` falls inside a replaced key.
    pub fn from_source_offset(&mut self, source: usize) -> Result<usize, usize> {
        while self.source_offsets.last().is_some_and(|&end| end < source) && self.grow_one() {}
        let after = self.source_offsets.partition_point(|&end| end <= source);
        match after.checked_sub(1) {
            Some(last) if self.source_offsets[last] == source => Ok(last),
            _ => Err(after),
        }
    }

    /// The source text behind the converted range.
    pub fn source_slice(&mut self, range: Range<usize>) -> Option<&str> {
        let start = self.to_source_offset(range.start)?;
        let end = self.to_source_offset(range.end)?;
        self.matcher.text().get(start..end)
    }

    /// Finish the conversion and return the text with its offset map.
    pub fn into_parts(mut self) -> (String, Vec<usize>) {
        while self.grow_one() {}
        (self.buffer, self.source_offsets)
    }

    fn grow_to(&mut self, len: usize) {
        while self.buffer.len() < len && self.grow_one() {}
    }

    /// Convert one match or one character. Returns `false` at the end.
    fn grow_one(&mut self) -> bool {
        if !self.matcher.has_more() {
            return false;
        }
        let start = self.buffer.len();
        let source_end =
            if self.matcher.advance_filtered(MatchFilter::LongestMatch) == MatchStatus::Match {
                match self.matcher.match_value() {
                    Some(value) => {
                        self.buffer.push_str(&value.to_string());
                        let end = self.matcher.match_end();
                        self.matcher.set_offset(end);
                        end
                    }
                    None => self.copy_char(),
                }
            } else {
                self.copy_char()
            };

        if self.buffer.len() == start {
            // An empty replacement moves the current end forward.
            if let Some(last) = self.source_offsets.last_mut() {
                *last = source_end;
            }
        } else {
            self.source_offsets.resize(self.buffer.len() + 1, source_end);
        }
        true
    }

    fn copy_char(&mut self) -> usize {
        let offset = self.matcher.offset();
        if let Some(ch) = self.matcher.text()[offset..].chars().next() {
            self.buffer.push(ch);
        }
        self.matcher.next_offset();
        self.matcher.offset()
    }
}

impl<'d, V: 'd, M> fmt::Debug for ConvertedText<'d, V, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvertedText")
            .field("converted", &self.buffer)
            .field("source_offsets", &self.source_offsets)
            .finish_non_exhaustive()
    }
}
