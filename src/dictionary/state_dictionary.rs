//! The automaton-backed dictionary and its matcher.

use std::fmt;
use std::sync::Arc;

use super::automaton::{Automaton, AutomatonStats, StateId, Uniqueness};
use super::builder::StateDictionaryBuilder;
use super::converted::ConvertedText;
use super::error::BuildError;
use super::results::ResultTable;
use super::{MatchStatus, Matcher};
use crate::codec::{ByteEncoding, CharEncoder, CodecError};

/// An immutable string → value dictionary backed by a minimized automaton.
///
/// The automaton and the result table sit behind `Arc`, so cloning is cheap
/// and a dictionary can be shared across threads; every query gets its own
/// [`StateMatcher`].
#[derive(Debug)]
pub struct StateDictionary<V> {
    automaton: Arc<Automaton>,
    results: Arc<ResultTable<V>>,
}

impl<V> Clone for StateDictionary<V> {
    fn clone(&self) -> Self {
        Self {
            automaton: Arc::clone(&self.automaton),
            results: Arc::clone(&self.results),
        }
    }
}

impl<V> StateDictionary<V> {
    /// Start a builder.
    pub fn builder() -> StateDictionaryBuilder<V> {
        StateDictionaryBuilder::new()
    }

    /// Build a dictionary with the default encoding.
    pub fn from_pairs<K, I>(pairs: I) -> Result<Self, BuildError>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, V)>,
        V: PartialEq,
    {
        StateDictionaryBuilder::from_pairs(pairs)
    }

    /// Reassemble a dictionary from a decoded automaton and its results.
    ///
    /// Fails with [`CodecError::KeyCountMismatch`] if the automaton accepts a
    /// different number of keys than `results` holds, and with
    /// [`CodecError::MissingResult`] if some accepting path has no entry.
    pub fn from_parts(automaton: Automaton, results: ResultTable<V>) -> Result<Self, CodecError> {
        automaton.verify_results(&results)?;
        Ok(Self::from_verified_parts(Arc::new(automaton), Arc::new(results)))
    }

    pub(crate) fn from_verified_parts(
        automaton: Arc<Automaton>,
        results: Arc<ResultTable<V>>,
    ) -> Self {
        Self { automaton, results }
    }

    /// The underlying automaton.
    pub fn automaton(&self) -> &Automaton {
        &self.automaton
    }

    /// The payloads, in encoded key order.
    pub fn results(&self) -> &ResultTable<V> {
        &self.results
    }

    /// The byte encoding of keys and scanned text.
    pub fn encoding(&self) -> ByteEncoding {
        self.automaton.encoding()
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether the dictionary has no keys.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Row and cell statistics of the automaton.
    pub fn stats(&self) -> AutomatonStats {
        self.automaton.stats()
    }

    /// Create a matcher over `text`, positioned at offset 0.
    pub fn matcher<'d, 't>(&'d self, text: &'t str) -> StateMatcher<'d, 't, V> {
        StateMatcher::new(self, text)
    }

    /// A lazily converted view of `text`, see [`ConvertedText`].
    pub fn converted<'d, 't>(
        &'d self,
        text: &'t str,
    ) -> ConvertedText<'d, V, StateMatcher<'d, 't, V>>
    where
        V: fmt::Display,
    {
        ConvertedText::new(self.matcher(text))
    }

    /// Value of an exact key.
    pub fn get(&self, key: &str) -> Option<&V> {
        let automaton = &*self.automaton;
        let mut encoder = automaton.encoding().encoder();
        let mut scratch = Vec::with_capacity(automaton.max_bytes_per_char());
        let mut row = Some(automaton.start());
        let mut acc = 0i64;
        let mut returns = false;
        for ch in key.chars() {
            scratch.clear();
            encoder.push_char(ch, &mut scratch);
            for &byte in &scratch {
                let cell = automaton.cell(row?, byte)?;
                acc = acc.wrapping_add(cell.delta);
                returns = cell.returns;
                row = cell.target;
            }
        }
        if returns {
            self.results.get(acc)
        } else {
            None
        }
    }

    /// Whether `key` is stored.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Every `(key, value)` pair, in encoded key order.
    ///
    /// Keys are recovered by walking the automaton and decoding the bytes.
    pub fn entries(&self) -> Result<Vec<(String, &V)>, CodecError> {
        let encoding = self.automaton.encoding();
        let mut entries = Vec::with_capacity(self.results.len());
        self.automaton.for_each_key(|bytes, key| {
            let value = self
                .results
                .get(key)
                .ok_or(CodecError::MissingResult(key))?;
            entries.push((encoding.decode_str(bytes)?, value));
            Ok(())
        })?;
        Ok(entries)
    }
}

/// Result of feeding one character's bytes to the automaton.
enum Step {
    /// Some byte had no transition.
    Rejected,
    /// The character was consumed without completing a key.
    Continue { row: StateId, acc: i64 },
    /// The character completed a key.
    Accept { row: Option<StateId>, acc: i64 },
}

fn step(automaton: &Automaton, row: StateId, acc: i64, bytes: &[u8]) -> Step {
    let mut current = Some(row);
    let mut acc = acc;
    let mut returns = false;
    for &byte in bytes {
        let Some(cell) = current.and_then(|id| automaton.cell(id, byte)) else {
            return Step::Rejected;
        };
        acc = acc.wrapping_add(cell.delta);
        returns = cell.returns;
        current = cell.target;
    }
    match (returns, current) {
        (true, row) => Step::Accept { row, acc },
        (false, Some(row)) => Step::Continue { row, acc },
        (false, None) => Step::Rejected,
    }
}

/// Cursor over a text, matching against a [`StateDictionary`].
///
/// Text is encoded one character at a time, so a character the automaton
/// cannot follow leaves the cursor on the previous character boundary.
pub struct StateMatcher<'d, 't, V> {
    automaton: &'d Automaton,
    results: &'d ResultTable<V>,
    text: &'t str,
    offset: usize,
    match_end: usize,
    /// Row at `match_end`; `None` once the cursor is exhausted.
    row: Option<StateId>,
    acc: i64,
    status: MatchStatus,
    match_value: Option<&'d V>,
    /// Boundary row and accumulator of the last partial.
    partial: Option<(StateId, i64)>,
    encoder: CharEncoder,
    scratch: Vec<u8>,
}

impl<'d, 't, V> StateMatcher<'d, 't, V> {
    fn new(dictionary: &'d StateDictionary<V>, text: &'t str) -> Self {
        let automaton = &*dictionary.automaton;
        Self {
            automaton,
            results: &*dictionary.results,
            text,
            offset: 0,
            match_end: 0,
            row: Some(automaton.start()),
            acc: 0,
            status: MatchStatus::None,
            match_value: None,
            partial: None,
            encoder: automaton.encoding().encoder(),
            scratch: Vec::with_capacity(automaton.max_bytes_per_char()),
        }
    }

    /// Replace the scanned text and restart at offset 0.
    pub fn set_text(&mut self, text: &'t str) {
        self.text = text;
        self.set_offset(0);
    }

    /// Status of the last step.
    pub fn status(&self) -> MatchStatus {
        self.status
    }

    fn finish(&mut self, status: MatchStatus) -> MatchStatus {
        self.row = None;
        self.status = status;
        self.match_value = None;
        status
    }
}

impl<'d, 't, V> Matcher<'d, V> for StateMatcher<'d, 't, V> {
    fn text(&self) -> &str {
        self.text
    }

    fn offset(&self) -> usize {
        self.offset
    }

    fn set_offset(&mut self, offset: usize) {
        assert!(
            self.text.is_char_boundary(offset),
            "offset {offset} is not a character boundary of a {}-byte text",
            self.text.len()
        );
        self.offset = offset;
        self.match_end = offset;
        self.row = Some(self.automaton.start());
        self.acc = 0;
        self.status = MatchStatus::None;
        self.match_value = None;
        self.partial = None;
        self.encoder.reset();
    }

    fn match_end(&self) -> usize {
        self.match_end
    }

    fn match_value(&self) -> Option<&'d V> {
        self.match_value
    }

    fn advance(&mut self) -> MatchStatus {
        let Some(mut row) = self.row else {
            return self.finish(MatchStatus::None);
        };
        let text = self.text;
        while let Some(ch) = text[self.match_end..].chars().next() {
            self.scratch.clear();
            self.encoder.push_char(ch, &mut self.scratch);
            match step(self.automaton, row, self.acc, &self.scratch) {
                Step::Rejected => break,
                Step::Continue { row: next, acc } => {
                    row = next;
                    self.acc = acc;
                    self.match_end += ch.len_utf8();
                }
                Step::Accept { row: next, acc } => {
                    self.row = next;
                    self.acc = acc;
                    self.match_end += ch.len_utf8();
                    self.status = MatchStatus::Match;
                    self.match_value = self.results.get(acc);
                    return MatchStatus::Match;
                }
            }
        }

        if self.match_end > self.offset && !self.automaton.cells(row).is_empty() {
            self.partial = Some((row, self.acc));
            self.finish(MatchStatus::Partial)
        } else {
            self.finish(MatchStatus::None)
        }
    }

    fn resolve_unique_partial(&mut self) -> Option<&'d V> {
        if self.status != MatchStatus::Partial {
            return None;
        }
        let (mut row, mut acc) = self.partial?;
        if self.automaton.uniqueness(row) != Uniqueness::Unique {
            return None;
        }
        // A unique row has exactly one accepting path: its first cells.
        loop {
            let cell = self.automaton.cells(row).first()?;
            acc = acc.wrapping_add(cell.delta);
            if cell.returns {
                self.match_value = self.results.get(acc);
                return self.match_value;
            }
            row = cell.target?;
        }
    }

    fn restore_match(&mut self, status: MatchStatus, end: usize, value: Option<&'d V>) {
        self.status = status;
        self.match_end = end;
        self.match_value = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::MatchFilter;

    fn build<V: PartialEq, const N: usize>(
        encoding: ByteEncoding,
        pairs: [(&str, V); N],
    ) -> StateDictionary<V> {
        let mut builder = StateDictionaryBuilder::new().encoding(encoding);
        builder.extend(pairs).unwrap();
        builder.build().unwrap()
    }

    fn manners(encoding: ByteEncoding) -> StateDictionary<&'static str> {
        build(
            encoding,
            [("man", "Woman"), ("many", "Few"), ("manner", "Style")],
        )
    }

    const ENCODINGS: [ByteEncoding; 3] = [
        ByteEncoding::Utf8,
        ByteEncoding::Compact,
        ByteEncoding::CompactDelta,
    ];

    #[test]
    fn test_advance_reports_every_prefix_key() {
        for encoding in ENCODINGS {
            let dictionary = manners(encoding);
            let mut matcher = dictionary.matcher("manners");
            assert_eq!(matcher.advance(), MatchStatus::Match);
            assert_eq!(matcher.match_text(), "man");
            assert_eq!(matcher.match_value(), Some(&"Woman"));
            assert_eq!(matcher.advance(), MatchStatus::Match);
            assert_eq!(matcher.match_text(), "manner");
            assert_eq!(matcher.match_value(), Some(&"Style"));
            assert_eq!(matcher.advance(), MatchStatus::None);
            assert_eq!(matcher.advance(), MatchStatus::None);
        }
    }

    #[test]
    fn test_partial_at_end_of_text() {
        let dictionary = manners(ByteEncoding::CompactDelta);
        let mut matcher = dictionary.matcher("ma");
        assert_eq!(matcher.advance(), MatchStatus::Partial);
        assert_eq!(matcher.match_end(), 2);
        assert_eq!(matcher.match_value(), None);
        assert_eq!(matcher.advance(), MatchStatus::None);
    }

    #[test]
    fn test_partial_after_match_on_divergence() {
        let dictionary = manners(ByteEncoding::Utf8);
        let mut matcher = dictionary.matcher("manne!");
        assert_eq!(matcher.advance(), MatchStatus::Match);
        assert_eq!(matcher.advance(), MatchStatus::Partial);
        assert_eq!(matcher.match_text(), "manne");
        assert_eq!(matcher.resolve_unique_partial(), Some(&"Style"));
        // The match end stays on the consumed text.
        assert_eq!(matcher.match_end(), 5);
    }

    #[test]
    fn test_ambiguous_partial_does_not_resolve() {
        let dictionary = manners(ByteEncoding::Utf8);
        let mut matcher = dictionary.matcher("ma");
        assert_eq!(matcher.advance(), MatchStatus::Partial);
        assert_eq!(matcher.resolve_unique_partial(), None);
    }

    #[test]
    fn test_resolve_requires_partial() {
        let dictionary = manners(ByteEncoding::Utf8);
        let mut matcher = dictionary.matcher("man");
        assert_eq!(matcher.advance(), MatchStatus::Match);
        assert_eq!(matcher.resolve_unique_partial(), None);
    }

    #[test]
    fn test_none_without_consuming() {
        let dictionary = manners(ByteEncoding::Utf8);
        let mut matcher = dictionary.matcher("xman");
        assert_eq!(matcher.advance(), MatchStatus::None);
        assert_eq!(matcher.match_end(), 0);

        let mut matcher = dictionary.matcher("");
        assert_eq!(matcher.advance(), MatchStatus::None);
    }

    #[test]
    fn test_set_offset_restarts() {
        let dictionary = manners(ByteEncoding::CompactDelta);
        let mut matcher = dictionary.matcher("many manners");
        assert_eq!(matcher.advance_filtered(MatchFilter::LongestMatch), MatchStatus::Match);
        assert_eq!(matcher.match_text(), "many");

        matcher.set_offset(5);
        assert_eq!(matcher.advance_filtered(MatchFilter::LongestMatch), MatchStatus::Match);
        assert_eq!(matcher.match_text(), "manner");
        assert_eq!(matcher.match_end(), 11);
    }

    #[test]
    #[should_panic(expected = "not a character boundary")]
    fn test_offset_inside_character_panics() {
        let dictionary = manners(ByteEncoding::Utf8);
        let mut matcher = dictionary.matcher("é");
        matcher.set_offset(1);
    }

    #[test]
    #[should_panic(expected = "not a character boundary")]
    fn test_offset_past_end_panics() {
        let dictionary = manners(ByteEncoding::Utf8);
        let mut matcher = dictionary.matcher("ab");
        matcher.set_offset(3);
    }

    #[test]
    fn test_multibyte_keys_match_at_offsets() {
        for encoding in ENCODINGS {
            let dictionary = build(encoding, [("東京", 1), ("東京都", 2), ("京都", 3)]);
            let text = "東京都";
            let mut matcher = dictionary.matcher(text);
            assert_eq!(matcher.advance(), MatchStatus::Match);
            assert_eq!(matcher.match_value(), Some(&1));
            assert_eq!(matcher.advance(), MatchStatus::Match);
            assert_eq!(matcher.match_value(), Some(&2));

            matcher.next_offset();
            assert_eq!(matcher.offset(), "東".len());
            assert_eq!(matcher.advance(), MatchStatus::Match);
            assert_eq!(matcher.match_text(), "京都");
            assert_eq!(matcher.match_value(), Some(&3));
        }
    }

    #[test]
    fn test_diverging_multibyte_character_keeps_boundary() {
        // 'é' and 'ê' share their first UTF-8 byte.
        let dictionary = build(ByteEncoding::Utf8, [("aé", 1), ("aéz", 2)]);
        let mut matcher = dictionary.matcher("aê");
        assert_eq!(matcher.advance(), MatchStatus::Partial);
        assert_eq!(matcher.match_text(), "a");
        assert_eq!(matcher.resolve_unique_partial(), None);

        let mut matcher = dictionary.matcher("aéê");
        assert_eq!(matcher.advance(), MatchStatus::Match);
        assert_eq!(matcher.advance(), MatchStatus::Partial);
        assert_eq!(matcher.match_text(), "aé");
        assert_eq!(matcher.resolve_unique_partial(), Some(&2));
    }

    #[test]
    fn test_get_and_entries() {
        for encoding in ENCODINGS {
            let dictionary = manners(encoding);
            assert_eq!(dictionary.get("many"), Some(&"Few"));
            assert_eq!(dictionary.get("mann"), None);
            assert_eq!(dictionary.get(""), None);
            assert!(dictionary.contains_key("manner"));

            let entries = dictionary.entries().unwrap();
            let keys: Vec<&str> = entries.iter().map(|(key, _)| key.as_str()).collect();
            assert_eq!(keys, vec!["man", "manner", "many"]);
            assert_eq!(entries[2].1, &"Few");
        }
    }

    #[test]
    fn test_from_parts_checks_results() {
        let dictionary = manners(ByteEncoding::Utf8);
        let automaton = dictionary.automaton().clone();
        let short = ResultTable::from_values(vec!["only"]);
        assert!(matches!(
            StateDictionary::from_parts(automaton.clone(), short),
            Err(CodecError::KeyCountMismatch {
                paths: 3,
                results: 1
            })
        ));
        let full = ResultTable::from_values(dictionary.results().values().to_vec());
        let rebuilt = StateDictionary::from_parts(automaton, full).unwrap();
        assert_eq!(rebuilt.get("man"), Some(&"Woman"));
    }

    #[test]
    fn test_set_text_reuses_matcher() {
        let dictionary = manners(ByteEncoding::CompactDelta);
        let mut matcher = dictionary.matcher("xyz");
        assert_eq!(matcher.advance(), MatchStatus::None);
        matcher.set_text("many");
        assert_eq!(matcher.advance_filtered(MatchFilter::LongestMatch), MatchStatus::Match);
        assert_eq!(matcher.match_value(), Some(&"Few"));
        assert_eq!(matcher.match_end(), 4);
    }
}
