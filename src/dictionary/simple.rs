//! A sorted-map dictionary that answers matcher queries by brute force.
//!
//! [`SimpleDictionary`] has no automaton at all: every step asks the map
//! whether some key starts with the consumed text. It is slow, but obviously
//! correct, which makes it the reference the automaton is checked against.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;

use super::converted::ConvertedText;
use super::error::BuildError;
use super::{MatchStatus, Matcher};

/// A dictionary stored as a plain sorted map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleDictionary<V> {
    entries: BTreeMap<String, V>,
}

impl<V> SimpleDictionary<V> {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Build a dictionary from `pairs`, with the same key rules as
    /// [`StateDictionaryBuilder`](super::StateDictionaryBuilder).
    pub fn from_pairs<K, I>(pairs: I) -> Result<Self, BuildError>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, V)>,
        V: PartialEq,
    {
        let mut dictionary = Self::new();
        for (key, value) in pairs {
            dictionary.insert(key, value)?;
        }
        Ok(dictionary)
    }

    /// Add a key; an equal re-insert is a no-op, a different value an error.
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Result<(), BuildError>
    where
        V: PartialEq,
    {
        let key = key.into();
        if key.is_empty() {
            return Err(BuildError::EmptyKey);
        }
        match self.entries.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(value);
                Ok(())
            }
            Entry::Occupied(slot) if *slot.get() == value => Ok(()),
            Entry::Occupied(slot) => Err(BuildError::ConflictingValue {
                key: slot.key().clone(),
            }),
        }
    }

    /// Value of an exact key.
    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the dictionary has no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Create a matcher over `text`, positioned at offset 0.
    pub fn matcher<'d, 't>(&'d self, text: &'t str) -> SimpleMatcher<'d, 't, V> {
        SimpleMatcher {
            entries: &self.entries,
            text,
            offset: 0,
            match_end: 0,
            exhausted: false,
            status: MatchStatus::None,
            match_value: None,
        }
    }
}

impl<V: fmt::Display> SimpleDictionary<V> {
    /// A lazily converted view of `text`, see [`ConvertedText`].
    pub fn converted<'d, 't>(
        &'d self,
        text: &'t str,
    ) -> ConvertedText<'d, V, SimpleMatcher<'d, 't, V>> {
        ConvertedText::new(self.matcher(text))
    }
}

impl<V> Default for SimpleDictionary<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Keys strictly longer than `prefix` that start with it.
fn extensions<'d, V>(
    entries: &'d BTreeMap<String, V>,
    prefix: &str,
) -> impl Iterator<Item = (&'d String, &'d V)> + 'd
where
    V: 'd,
{
    let prefix = prefix.to_owned();
    entries
        .range::<str, _>((Bound::Excluded(prefix.as_str()), Bound::Unbounded))
        .take_while(move |(key, _)| key.starts_with(prefix.as_str()))
}

fn has_key_with_prefix<V>(entries: &BTreeMap<String, V>, prefix: &str) -> bool {
    entries
        .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
        .next()
        .is_some_and(|(key, _)| key.starts_with(prefix))
}

/// Brute-force matcher with the same contract as
/// [`StateMatcher`](super::StateMatcher).
pub struct SimpleMatcher<'d, 't, V> {
    entries: &'d BTreeMap<String, V>,
    text: &'t str,
    offset: usize,
    match_end: usize,
    exhausted: bool,
    status: MatchStatus,
    match_value: Option<&'d V>,
}

impl<'d, 't, V> SimpleMatcher<'d, 't, V> {
    /// Replace the scanned text and restart at offset 0.
    pub fn set_text(&mut self, text: &'t str) {
        self.text = text;
        self.set_offset(0);
    }

    fn finish(&mut self, status: MatchStatus) -> MatchStatus {
        self.exhausted = true;
        self.status = status;
        self.match_value = None;
        status
    }
}

impl<'d, 't, V> Matcher<'d, V> for SimpleMatcher<'d, 't, V> {
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
        self.exhausted = false;
        self.status = MatchStatus::None;
        self.match_value = None;
    }

    fn match_end(&self) -> usize {
        self.match_end
    }

    fn match_value(&self) -> Option<&'d V> {
        self.match_value
    }

    fn advance(&mut self) -> MatchStatus {
        if self.exhausted {
            return self.finish(MatchStatus::None);
        }
        let entries = self.entries;
        let text = self.text;
        while let Some(ch) = text[self.match_end..].chars().next() {
            let end = self.match_end + ch.len_utf8();
            let consumed = &text[self.offset..end];
            if !has_key_with_prefix(entries, consumed) {
                break;
            }
            self.match_end = end;
            if let Some(value) = entries.get(consumed) {
                self.exhausted = extensions(entries, consumed).next().is_none();
                self.status = MatchStatus::Match;
                self.match_value = Some(value);
                return MatchStatus::Match;
            }
        }

        let consumed = &text[self.offset..self.match_end];
        if !consumed.is_empty() && extensions(entries, consumed).next().is_some() {
            self.finish(MatchStatus::Partial)
        } else {
            self.finish(MatchStatus::None)
        }
    }

    fn resolve_unique_partial(&mut self) -> Option<&'d V> {
        if self.status != MatchStatus::Partial {
            return None;
        }
        let mut candidates = extensions(self.entries, &self.text[self.offset..self.match_end]);
        let (_, value) = candidates.next()?;
        if candidates.next().is_some() {
            return None;
        }
        self.match_value = Some(value);
        Some(value)
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

    fn manners() -> SimpleDictionary<&'static str> {
        SimpleDictionary::from_pairs([("man", "Woman"), ("many", "Few"), ("manner", "Style")])
            .unwrap()
    }

    #[test]
    fn test_matches_and_partials() {
        let dictionary = manners();
        let mut matcher = dictionary.matcher("manne");
        assert_eq!(matcher.advance(), MatchStatus::Match);
        assert_eq!(matcher.match_value(), Some(&"Woman"));
        assert_eq!(matcher.advance(), MatchStatus::Partial);
        assert_eq!(matcher.match_text(), "manne");
        assert_eq!(matcher.resolve_unique_partial(), Some(&"Style"));
        assert_eq!(matcher.advance(), MatchStatus::None);
    }

    #[test]
    fn test_leaf_match_exhausts() {
        let dictionary = manners();
        let mut matcher = dictionary.matcher("manyx");
        assert_eq!(matcher.advance_filtered(MatchFilter::Matches), MatchStatus::Match);
        assert_eq!(matcher.advance_filtered(MatchFilter::Matches), MatchStatus::Match);
        assert_eq!(matcher.match_text(), "many");
        assert_eq!(matcher.advance(), MatchStatus::None);
        assert_eq!(matcher.match_end(), 4);
    }

    #[test]
    fn test_key_rules() {
        let mut dictionary = manners();
        assert_eq!(dictionary.insert("", "x"), Err(BuildError::EmptyKey));
        assert!(dictionary.insert("man", "Woman").is_ok());
        assert!(matches!(
            dictionary.insert("man", "Boy"),
            Err(BuildError::ConflictingValue { .. })
        ));
        assert_eq!(dictionary.len(), 3);
    }
}
