//! State dictionaries and the matchers that scan text against them.
//!
//! A dictionary maps string keys to payload values. Lookups are driven by a
//! [`Matcher`], a cursor that walks a text from an offset and reports, one
//! step at a time, whether the consumed text is a key ([`MatchStatus::Match`]),
//! a proper prefix of some key ([`MatchStatus::Partial`]) or neither
//! ([`MatchStatus::None`]).
//!
//! Two backends share the matcher contract:
//!
//! - [`StateDictionary`]: a minimized byte automaton plus a result table.
//! - [`SimpleDictionary`]: a sorted map scanned by brute force, useful as a
//!   reference implementation.

use std::fmt;

pub mod automaton;
pub mod builder;
pub mod converted;
pub mod error;
pub mod results;
pub mod simple;
pub mod state_dictionary;

pub use automaton::{Automaton, AutomatonStats, Cell, StateId, Uniqueness};
pub use builder::StateDictionaryBuilder;
pub use converted::ConvertedText;
pub use error::BuildError;
pub use results::ResultTable;
pub use simple::{SimpleDictionary, SimpleMatcher};
pub use state_dictionary::{StateDictionary, StateMatcher};

/// Outcome of a single matcher step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MatchStatus {
    /// Nothing (more) can be matched from the current offset.
    #[default]
    None,
    /// The consumed text is a proper prefix of at least one key.
    Partial,
    /// The consumed text is a key.
    Match,
}

/// Which results [`Matcher::advance_filtered`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MatchFilter {
    /// Every result, exactly as [`Matcher::advance`] returns it.
    #[default]
    All,
    /// Only matches; the stream ends with NONE.
    Matches,
    /// The longest match from the offset.
    LongestMatch,
    /// The longest match or partial from the offset.
    Longest,
    /// The longest match, or partial that resolves to a unique key.
    LongestUnique,
    /// The longest match, or a partial that runs to the end of the text.
    LongestWithFinalPartial,
}

/// A cursor that matches dictionary keys against a text.
///
/// Offsets are byte offsets into [`text`](Matcher::text) and must lie on a
/// character boundary. The cursor starts at an offset and consumes
/// characters from there; every call to [`advance`](Matcher::advance)
/// extends the consumed span until the dictionary can no longer follow it.
///
/// # Examples
///
/// ```
/// use statedict::prelude::*;
///
/// let dictionary = StateDictionary::from_pairs([
///     ("man", "Woman"),
///     ("many", "Few"),
///     ("manner", "Style"),
/// ])?;
/// let mut matcher = dictionary.matcher("many manners ma");
///
/// assert_eq!(matcher.advance(), MatchStatus::Match);
/// assert_eq!(matcher.match_text(), "man");
/// assert_eq!(matcher.match_value(), Some(&"Woman"));
///
/// assert_eq!(matcher.advance(), MatchStatus::Match);
/// assert_eq!(matcher.match_text(), "many");
///
/// assert_eq!(matcher.advance(), MatchStatus::None);
/// # Ok::<(), statedict::dictionary::BuildError>(())
/// ```
pub trait Matcher<'d, V: 'd> {
    /// The scanned text.
    fn text(&self) -> &str;

    /// Where the current match attempt starts.
    fn offset(&self) -> usize;

    /// Restart matching at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if `offset` is past the end of the text or not on a character
    /// boundary.
    fn set_offset(&mut self, offset: usize);

    /// End of the last reported match or partial.
    fn match_end(&self) -> usize;

    /// Payload of the last match, or of a resolved unique partial.
    fn match_value(&self) -> Option<&'d V>;

    /// Consume text up to the next key, or until the dictionary diverges.
    fn advance(&mut self) -> MatchStatus;

    /// After a [`MatchStatus::Partial`], the payload of the only key the
    /// partial text can complete to, if there is exactly one.
    fn resolve_unique_partial(&mut self) -> Option<&'d V>;

    /// Reinstate a previously reported result.
    ///
    /// Used by the longest-result filters, which read past the result they
    /// finally report.
    fn restore_match(&mut self, status: MatchStatus, end: usize, value: Option<&'d V>);

    /// The text between the offset and the match end.
    fn match_text(&self) -> &str {
        &self.text()[self.offset()..self.match_end()]
    }

    /// Whether the offset has not reached the end of the text.
    fn has_more(&self) -> bool {
        self.offset() < self.text().len()
    }

    /// Move the offset one character forward.
    ///
    /// # Panics
    ///
    /// Panics if the offset is already at the end of the text.
    fn next_offset(&mut self) {
        let offset = self.offset();
        let step = self.text()[offset..]
            .chars()
            .next()
            .map_or(1, char::len_utf8);
        self.set_offset(offset + step);
    }

    /// Advance, reporting only the results `filter` selects.
    fn advance_filtered(&mut self, filter: MatchFilter) -> MatchStatus {
        if filter == MatchFilter::All {
            return self.advance();
        }

        let mut best: Option<(MatchStatus, usize, Option<&'d V>)> = None;
        loop {
            let status = self.advance();
            let keep = match status {
                MatchStatus::None => break,
                MatchStatus::Match if filter == MatchFilter::Matches => return status,
                MatchStatus::Match => true,
                MatchStatus::Partial => match filter {
                    MatchFilter::Longest => true,
                    MatchFilter::LongestUnique => self.resolve_unique_partial().is_some(),
                    MatchFilter::LongestWithFinalPartial => {
                        self.match_end() == self.text().len()
                    }
                    _ => false,
                },
            };
            if keep {
                best = Some((status, self.match_end(), self.match_value()));
            }
        }

        match best {
            Some((status, end, value)) => {
                self.restore_match(status, end, value);
                status
            }
            None => MatchStatus::None,
        }
    }

    /// Scan forward from the offset until `filter` reports something.
    ///
    /// Returns [`MatchStatus::None`] once the offset reaches the end of the
    /// text without a result.
    fn find(&mut self, filter: MatchFilter) -> MatchStatus {
        loop {
            let status = self.advance_filtered(filter);
            if status != MatchStatus::None || !self.has_more() {
                return status;
            }
            self.next_offset();
        }
    }

    /// Rewrite the rest of the text into `out`, replacing every longest
    /// match by its payload.
    ///
    /// Characters that start no match are copied unchanged.
    fn convert(&mut self, out: &mut String)
    where
        V: fmt::Display,
    {
        while self.has_more() {
            if self.advance_filtered(MatchFilter::LongestMatch) == MatchStatus::Match {
                if let Some(value) = self.match_value() {
                    out.push_str(&value.to_string());
                    let end = self.match_end();
                    self.set_offset(end);
                    continue;
                }
            }
            let offset = self.offset();
            if let Some(ch) = self.text()[offset..].chars().next() {
                out.push(ch);
            }
            self.next_offset();
        }
    }
}
