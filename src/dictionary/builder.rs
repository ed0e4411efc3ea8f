//! Construction of minimized state dictionaries.
//!
//! Building happens in three passes over the key set:
//!
//! 1. Every key is encoded with the dictionary's [`ByteEncoding`] and the
//!    encoded keys are sorted. Payloads are pushed into the
//!    [`ResultTable`] in that order, so the n-th key owns result key `n`.
//! 2. The encoded keys are inserted into a plain byte trie.
//! 3. The trie is frozen bottom-up. Each row gets its cell deltas, then is
//!    looked up in a signature cache so that equivalent suffixes collapse
//!    into a single row. The surviving rows are numbered in a canonical
//!    order that keeps every transition pointing backwards.
//!
//! A cell's delta is the number of keys reachable through its smaller
//! siblings, plus one if the cell itself completes a key. Summing deltas
//! along an accepting path therefore yields the key's 1-based rank in
//! encoded byte order. Deltas only depend on the subtree below a row, which
//! is what lets identical suffixes share rows.

use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::automaton::{Automaton, Cell, StateId};
use super::error::{BuildError, Result};
use super::results::ResultTable;
use super::state_dictionary::StateDictionary;
use crate::codec::ByteEncoding;

type RowCells = SmallVec<[Cell; 4]>;

/// Collects `key → value` pairs and builds a [`StateDictionary`].
///
/// Keys are kept in a sorted map until [`build`](Self::build), so insertion
/// order never influences the result: the same key set always produces the
/// same rows and the same persisted bytes.
///
/// # Examples
///
/// ```
/// use statedict::prelude::*;
///
/// let mut builder = StateDictionaryBuilder::new();
/// builder.insert("man", "Woman")?;
/// builder.insert("many", "Few")?;
/// builder.insert("manner", "Style")?;
/// let dictionary = builder.build()?;
///
/// assert_eq!(dictionary.get("many"), Some(&"Few"));
/// assert_eq!(dictionary.get("mann"), None);
/// # Ok::<(), statedict::dictionary::BuildError>(())
/// ```
#[derive(Debug, Clone)]
pub struct StateDictionaryBuilder<V> {
    entries: BTreeMap<String, V>,
    encoding: ByteEncoding,
}

impl<V> StateDictionaryBuilder<V> {
    /// Create a builder using [`ByteEncoding::CompactDelta`].
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            encoding: ByteEncoding::default(),
        }
    }

    /// Select the byte encoding of the automaton.
    pub fn encoding(mut self, encoding: ByteEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Number of distinct keys collected so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no key has been collected.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `key` has been collected.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Add a key.
    ///
    /// Inserting a key again with an equal value is a no-op; with a
    /// different value it fails with [`BuildError::ConflictingValue`].
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Result<()>
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

    /// Add every pair of `pairs`, stopping at the first error.
    pub fn extend<K, I>(&mut self, pairs: I) -> Result<()>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, V)>,
        V: PartialEq,
    {
        for (key, value) in pairs {
            self.insert(key, value)?;
        }
        Ok(())
    }

    /// Build a dictionary from `pairs` in one call.
    pub fn from_pairs<K, I>(pairs: I) -> Result<StateDictionary<V>>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, V)>,
        V: PartialEq,
    {
        let mut builder = Self::new();
        builder.extend(pairs)?;
        builder.build()
    }

    /// Freeze the collected keys into a minimized dictionary.
    pub fn build(self) -> Result<StateDictionary<V>> {
        let encoding = self.encoding;
        let key_count = self.entries.len();

        let mut encoded: Vec<(Vec<u8>, V)> = self
            .entries
            .into_iter()
            .map(|(key, value)| (encoding.encode_str(&key), value))
            .collect();
        encoded.sort_unstable_by(|a, b| a.0.cmp(&b.0));

        let mut trie = Trie::new();
        let mut results = ResultTable::with_capacity(key_count);
        for (bytes, value) in encoded {
            trie.insert(&bytes);
            results.push(value);
        }

        let automaton = if key_count == 0 {
            let mut automaton = Automaton::empty(encoding);
            automaton.compute_uniqueness();
            automaton
        } else {
            let rows = minimize(&trie);
            let mut automaton = Automaton::from_rows(encoding, rows);
            automaton
                .verify_forward_references()
                .map_err(|(row, target)| BuildError::ForwardReference { row, target })?;
            automaton.compute_uniqueness();
            automaton
        };
        automaton.verify_results(&results)?;

        tracing::debug!(
            keys = key_count,
            trie_rows = trie.rows.len(),
            rows = automaton.row_count(),
            cells = automaton.cell_count(),
            persisted_bytes = automaton.persisted_len(),
            %encoding,
            "state dictionary built"
        );

        Ok(StateDictionary::from_verified_parts(
            Arc::new(automaton),
            Arc::new(results),
        ))
    }
}

impl<V> Default for StateDictionaryBuilder<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct TrieCell {
    label: u8,
    returns: bool,
    target: Option<usize>,
}

#[derive(Debug, Default)]
struct TrieRow {
    cells: SmallVec<[TrieCell; 4]>,
}

/// Unminimized byte trie. Row 0 is the root, and every child row is
/// allocated after its parent.
#[derive(Debug)]
struct Trie {
    rows: Vec<TrieRow>,
}

impl Trie {
    fn new() -> Self {
        Self {
            rows: vec![TrieRow::default()],
        }
    }

    fn insert(&mut self, key: &[u8]) {
        let mut row = 0;
        for (i, &byte) in key.iter().enumerate() {
            let cells = &mut self.rows[row].cells;
            let pos = match cells.binary_search_by_key(&byte, |cell| cell.label) {
                Ok(pos) => pos,
                Err(pos) => {
                    cells.insert(
                        pos,
                        TrieCell {
                            label: byte,
                            ..TrieCell::default()
                        },
                    );
                    pos
                }
            };
            if i + 1 == key.len() {
                cells[pos].returns = true;
                return;
            }
            row = match cells[pos].target {
                Some(next) => next,
                None => {
                    let next = self.rows.len();
                    self.rows[row].cells[pos].target = Some(next);
                    self.rows.push(TrieRow::default());
                    next
                }
            };
        }
    }
}

/// A distinct row found while freezing, with targets as indices into the
/// frozen list.
#[derive(Debug)]
struct FrozenRow {
    cells: RowCells,
    depth: usize,
    paths: u64,
}

/// Freeze `trie` into canonical, backward-pointing rows.
fn minimize(trie: &Trie) -> Vec<RowCells> {
    let mut frozen: Vec<FrozenRow> = Vec::new();
    let mut cache: FxHashMap<RowCells, usize> = FxHashMap::default();
    let mut canonical = vec![0usize; trie.rows.len()];

    // Children always have larger indices, so walking backwards visits them
    // before their parents.
    for index in (0..trie.rows.len()).rev() {
        let mut cells = RowCells::new();
        let mut below = 0u64;
        let mut depth = 0usize;
        for cell in &trie.rows[index].cells {
            let target = cell.target.map(|t| canonical[t]);
            let returns = u64::from(cell.returns);
            cells.push(Cell {
                label: cell.label,
                returns: cell.returns,
                delta: (below + returns) as i64,
                target: target.map(|t| t as StateId),
            });
            below += returns;
            if let Some(t) = target {
                below += frozen[t].paths;
                depth = depth.max(frozen[t].depth + 1);
            }
        }

        canonical[index] = match cache.get(&cells) {
            Some(&existing) => existing,
            None => {
                let id = frozen.len();
                cache.insert(cells.clone(), id);
                frozen.push(FrozenRow {
                    cells,
                    depth,
                    paths: below,
                });
                id
            }
        };
    }

    tracing::trace!(
        trie_rows = trie.rows.len(),
        distinct_rows = frozen.len(),
        "trie frozen"
    );

    let numbering = canonical_numbering(&frozen);
    let mut rows = vec![RowCells::new(); frozen.len()];
    for (id, row) in frozen.into_iter().enumerate() {
        let mut cells = row.cells;
        for cell in &mut cells {
            cell.target = cell.target.map(|t| numbering[t as usize]);
        }
        rows[numbering[id] as usize] = cells;
    }
    debug_assert_eq!(
        numbering[canonical[0]] as usize + 1,
        rows.len(),
        "root must be numbered last"
    );
    rows
}

/// Assign final row numbers: by depth, shallow first, then by content.
///
/// Content comparison looks at targets through their final numbers, which
/// are always settled because a target is strictly shallower than its
/// source.
fn canonical_numbering(frozen: &[FrozenRow]) -> Vec<StateId> {
    let mut order: Vec<usize> = (0..frozen.len()).collect();
    order.sort_by_key(|&id| frozen[id].depth);

    let mut numbering = vec![StateId::MAX; frozen.len()];
    let mut next: StateId = 0;
    for group in order.chunk_by_mut(|&a, &b| frozen[a].depth == frozen[b].depth) {
        group.sort_by(|&a, &b| compare_rows(&frozen[a].cells, &frozen[b].cells, &numbering));
        for &id in group.iter() {
            numbering[id] = next;
            next += 1;
        }
    }
    numbering
}

fn compare_rows(a: &[Cell], b: &[Cell], numbering: &[StateId]) -> Ordering {
    let key = |cell: &Cell| {
        (
            cell.label,
            cell.delta,
            cell.returns,
            cell.target.map(|t| numbering[t as usize]),
        )
    };
    a.len()
        .cmp(&b.len())
        .then_with(|| a.iter().map(key).cmp(b.iter().map(key)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(
        pairs: &[(&str, &'static str)],
        encoding: ByteEncoding,
    ) -> StateDictionary<&'static str> {
        let mut builder = StateDictionaryBuilder::new().encoding(encoding);
        builder.extend(pairs.iter().copied()).unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn test_builds_man_many_manner() {
        let dictionary = build(
            &[("man", "Woman"), ("many", "Few"), ("manner", "Style")],
            ByteEncoding::Utf8,
        );
        assert_eq!(dictionary.len(), 3);
        assert_eq!(dictionary.get("man"), Some(&"Woman"));
        assert_eq!(dictionary.get("many"), Some(&"Few"));
        assert_eq!(dictionary.get("manner"), Some(&"Style"));
        assert_eq!(dictionary.get("ma"), None);
        assert_eq!(dictionary.get("manners"), None);
    }

    #[test]
    fn test_keys_accumulate_to_byte_rank() {
        let dictionary = build(
            &[("b", "second"), ("ab", "first"), ("c", "third")],
            ByteEncoding::Utf8,
        );
        let mut ranks = Vec::new();
        dictionary
            .automaton()
            .for_each_key::<(), _>(|bytes, key| {
                ranks.push((bytes.to_vec(), key));
                Ok(())
            })
            .unwrap();
        assert_eq!(
            ranks,
            vec![(b"ab".to_vec(), 1), (b"b".to_vec(), 2), (b"c".to_vec(), 3)]
        );
        assert_eq!(dictionary.results().values(), &["first", "second", "third"]);
    }

    #[test]
    fn test_common_suffixes_share_rows() {
        // "tapping" and "topping" share "pping"; the "ing" rows are shared
        // with "sing" as well.
        let shared = build(
            &[("tapping", "1"), ("topping", "1"), ("sing", "1")],
            ByteEncoding::Utf8,
        );
        let mut builder = StateDictionaryBuilder::new().encoding(ByteEncoding::Utf8);
        builder.insert("tapping", "1").unwrap();
        let single = builder.build().unwrap();

        // The unminimized trie has 15 rows.
        assert!(shared.automaton().row_count() < 15);
        assert_eq!(single.automaton().row_count(), 7);
        assert!(shared.automaton().verify_forward_references().is_ok());
    }

    #[test]
    fn test_rows_point_backwards_and_root_is_last() {
        let dictionary = build(
            &[("abc", "x"), ("abd", "y"), ("b", "z"), ("bcd", "w")],
            ByteEncoding::CompactDelta,
        );
        let automaton = dictionary.automaton();
        assert!(automaton.verify_forward_references().is_ok());
        let root = automaton.start();
        for id in 0..automaton.row_count() as StateId {
            for cell in automaton.cells(id) {
                assert_ne!(cell.target, Some(root));
            }
        }
    }

    #[test]
    fn test_insertion_order_does_not_matter() {
        let words = ["zeta", "alpha", "alphabet", "beta", "gamma", "αβγ", "東京"];
        let mut forward = StateDictionaryBuilder::new();
        let mut backward = StateDictionaryBuilder::new();
        for (i, word) in words.iter().enumerate() {
            forward.insert(*word, i).unwrap();
        }
        for (i, word) in words.iter().enumerate().rev() {
            backward.insert(*word, i).unwrap();
        }
        let forward = forward.build().unwrap();
        let backward = backward.build().unwrap();
        assert_eq!(
            forward.automaton().to_bytes(),
            backward.automaton().to_bytes()
        );
        assert_eq!(forward.results(), backward.results());
    }

    #[test]
    fn test_conflicting_value_rejected() {
        let mut builder = StateDictionaryBuilder::new();
        builder.insert("key", 1).unwrap();
        builder.insert("key", 1).unwrap();
        assert_eq!(
            builder.insert("key", 2),
            Err(BuildError::ConflictingValue {
                key: "key".to_string()
            })
        );
        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn test_empty_key_rejected() {
        let mut builder = StateDictionaryBuilder::new();
        assert_eq!(builder.insert("", 0), Err(BuildError::EmptyKey));
        assert!(builder.is_empty());
    }

    #[test]
    fn test_empty_dictionary() {
        let dictionary = StateDictionaryBuilder::<u8>::new().build().unwrap();
        assert!(dictionary.is_empty());
        assert_eq!(dictionary.automaton().row_count(), 1);
        assert_eq!(dictionary.get("a"), None);
    }

    #[test]
    fn test_all_encodings_agree_on_lookups() {
        let pairs = [("a", "1"), ("ab", "2"), ("é", "3"), ("東京都", "4"), ("\u{0}", "5")];
        for encoding in [
            ByteEncoding::Utf8,
            ByteEncoding::Compact,
            ByteEncoding::CompactDelta,
        ] {
            let dictionary = build(&pairs, encoding);
            for (key, value) in pairs {
                assert_eq!(dictionary.get(key), Some(&value), "{encoding} {key:?}");
            }
            assert_eq!(dictionary.get("東京"), None);
        }
    }
}
