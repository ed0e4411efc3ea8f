//! The frozen byte-level automaton.
//!
//! States ("rows") live in one arena and are addressed by [`StateId`]. Every
//! row's cells are stored contiguously in a shared cell arena, sorted by
//! unsigned byte value.
//!
//! Rows are numbered so that every transition points to a row with a smaller
//! number. The start row is therefore always the last one, and the persisted
//! form can be decoded in a single forward pass.
//!
//! ## Persisted layout
//!
//! ```text
//! [encoding tag] [unsigned row_count]
//! row*: { [byte] [signed delta] [signed (row_offset << 1) | returns] }* 0x00
//! ```
//!
//! `row_offset` is `source - target`, or `0` for a cell without a target.
//! Cell bytes are strictly ascending and rows are never empty, so a `0x00`
//! byte is a cell key when it opens a row and the terminator anywhere else.

use std::collections::BTreeMap;
use std::fmt;

use super::results::ResultTable;
use crate::codec::{
    read_signed, read_unsigned, signed_len, unsigned_len, write_signed, write_unsigned,
    ByteEncoding, CodecError,
};

/// Reference number of a row.
pub type StateId = u32;

/// Row terminator in the persisted layout.
const ROW_END: u8 = 0x00;

/// Smallest persisted row: one byte key, two one-byte varints, terminator.
const MIN_ROW_BYTES: usize = 4;

/// Edge counts at or below this use a linear scan instead of binary search.
const LINEAR_SEARCH_MAX: usize = 8;

/// How many keys are reachable from a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Uniqueness {
    /// Exactly one key can be completed from this row.
    Unique,
    /// Zero or several keys can be completed from this row.
    Ambiguous,
    /// Not computed yet.
    Unknown,
}

/// One transition of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    /// Byte consumed by this transition.
    pub label: u8,
    /// Whether taking this transition completes a key.
    pub returns: bool,
    /// Amount added to the accumulated key.
    pub delta: i64,
    /// Row reached by this transition, if any.
    pub target: Option<StateId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Row {
    cell_offset: u32,
    cell_count: u16,
    uniqueness: Uniqueness,
}

/// An immutable, minimized byte automaton.
///
/// Built by [`StateDictionaryBuilder`](super::builder::StateDictionaryBuilder)
/// or decoded with [`Automaton::from_bytes`]. It carries no payloads; those
/// live in a [`ResultTable`] indexed by the keys the automaton accumulates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Automaton {
    rows: Vec<Row>,
    cells: Vec<Cell>,
    encoding: ByteEncoding,
    max_key_bytes: usize,
    key_count: u64,
}

impl Automaton {
    /// An automaton that accepts nothing: a single row without cells.
    pub fn empty(encoding: ByteEncoding) -> Self {
        Self::from_rows(encoding, vec![Vec::<Cell>::new()])
    }

    /// Assemble rows given in reference order.
    ///
    /// Uniqueness is left [`Uniqueness::Unknown`] until
    /// [`Automaton::compute_uniqueness`] runs on a verified automaton.
    pub(crate) fn from_rows<R: AsRef<[Cell]>>(encoding: ByteEncoding, rows: Vec<R>) -> Self {
        let total: usize = rows.iter().map(|row| row.as_ref().len()).sum();
        let mut cells = Vec::with_capacity(total);
        let mut arena = Vec::with_capacity(rows.len());
        for row in &rows {
            let row = row.as_ref();
            arena.push(Row {
                cell_offset: cells.len() as u32,
                cell_count: row.len() as u16,
                uniqueness: Uniqueness::Unknown,
            });
            cells.extend_from_slice(row);
        }
        Self {
            rows: arena,
            cells,
            encoding,
            max_key_bytes: 0,
            key_count: 0,
        }
    }

    /// Check that every transition points to an earlier row.
    ///
    /// Returns the first offending `(source, target)` pair.
    pub fn verify_forward_references(&self) -> Result<(), (StateId, StateId)> {
        for source in 0..self.rows.len() as StateId {
            for cell in self.cells(source) {
                if let Some(target) = cell.target {
                    if target >= source {
                        return Err((source, target));
                    }
                }
            }
        }
        Ok(())
    }

    /// Compute per-row uniqueness and the longest key length, bottom-up.
    ///
    /// Requires the forward-reference invariant.
    pub(crate) fn compute_uniqueness(&mut self) {
        let mut paths = vec![0u64; self.rows.len()];
        let mut depth = vec![0usize; self.rows.len()];
        for id in 0..self.rows.len() {
            let row = self.rows[id];
            let start = row.cell_offset as usize;
            let mut count = 0u64;
            let mut longest = 0usize;
            for cell in &self.cells[start..start + row.cell_count as usize] {
                count = count.saturating_add(u64::from(cell.returns));
                let below = match cell.target {
                    Some(target) => {
                        count = count.saturating_add(paths[target as usize]);
                        depth[target as usize]
                    }
                    None => 0,
                };
                longest = longest.max(below + 1);
            }
            paths[id] = count;
            depth[id] = longest;
            self.rows[id].uniqueness = if count == 1 {
                Uniqueness::Unique
            } else {
                Uniqueness::Ambiguous
            };
        }
        self.max_key_bytes = depth.last().copied().unwrap_or(0);
        self.key_count = paths.last().copied().unwrap_or(0);
    }

    /// The start row.
    #[inline]
    pub fn start(&self) -> StateId {
        (self.rows.len() - 1) as StateId
    }

    /// The byte encoding keys and text are converted with.
    #[inline]
    pub fn encoding(&self) -> ByteEncoding {
        self.encoding
    }

    /// Maximum number of bytes a single code point expands to.
    pub fn max_bytes_per_char(&self) -> usize {
        self.encoding.max_bytes_per_char()
    }

    /// Length in bytes of the longest encoded key.
    pub fn max_key_bytes(&self) -> usize {
        self.max_key_bytes
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of cells over all rows.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Cells of a row, sorted by byte.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a row of this automaton.
    #[inline]
    pub fn cells(&self, id: StateId) -> &[Cell] {
        let row = self.rows[id as usize];
        let start = row.cell_offset as usize;
        &self.cells[start..start + row.cell_count as usize]
    }

    /// Find the cell of row `id` for `byte`.
    #[inline]
    pub fn cell(&self, id: StateId, byte: u8) -> Option<&Cell> {
        let cells = self.cells(id);
        if cells.len() <= LINEAR_SEARCH_MAX {
            cells.iter().find(|cell| cell.label == byte)
        } else {
            cells
                .binary_search_by_key(&byte, |cell| cell.label)
                .ok()
                .map(|pos| &cells[pos])
        }
    }

    /// Uniqueness tag of a row.
    #[inline]
    pub fn uniqueness(&self, id: StateId) -> Uniqueness {
        self.rows[id as usize].uniqueness
    }

    /// Visit every accepting path as `(key bytes, accumulated key)`.
    ///
    /// Paths are visited in ascending byte order. The walk keeps its own
    /// stack, so key length is bounded by memory rather than by the thread
    /// stack.
    pub fn for_each_key<E, F>(&self, mut visit: F) -> Result<(), E>
    where
        F: FnMut(&[u8], i64) -> Result<(), E>,
    {
        struct Frame {
            row: StateId,
            next_cell: usize,
            acc: i64,
        }

        let mut prefix = Vec::with_capacity(self.max_key_bytes);
        let mut stack = vec![Frame {
            row: self.start(),
            next_cell: 0,
            acc: 0,
        }];
        while let Some(frame) = stack.last_mut() {
            let Some(cell) = self.cells(frame.row).get(frame.next_cell) else {
                stack.pop();
                // The root frame has no label of its own.
                if !stack.is_empty() {
                    prefix.pop();
                }
                continue;
            };
            frame.next_cell += 1;
            let value = frame.acc.wrapping_add(cell.delta);
            prefix.push(cell.label);
            if cell.returns {
                visit(&prefix, value)?;
            }
            match cell.target {
                Some(row) => stack.push(Frame {
                    row,
                    next_cell: 0,
                    acc: value,
                }),
                None => {
                    prefix.pop();
                }
            }
        }
        Ok(())
    }

    /// Number of accepting paths from the start row, saturated at `u64::MAX`.
    pub fn key_count(&self) -> u64 {
        self.key_count
    }

    /// Check that every accepting path resolves in `results`.
    ///
    /// Runs in time linear in the number of cells: the path count must equal
    /// the table size, and the smallest and largest key reachable below each
    /// row are combined bottom-up, so no path is ever enumerated.
    pub fn verify_results<V>(&self, results: &ResultTable<V>) -> Result<(), CodecError> {
        if self.key_count != results.len() as u64 {
            return Err(CodecError::KeyCountMismatch {
                paths: self.key_count,
                results: results.len(),
            });
        }

        // Keys below a row, relative to the value accumulated on entry.
        let mut ranges: Vec<Option<(i128, i128)>> = Vec::with_capacity(self.rows.len());
        for id in 0..self.rows.len() as StateId {
            let mut range: Option<(i128, i128)> = None;
            for cell in self.cells(id) {
                let delta = i128::from(cell.delta);
                if cell.returns {
                    range = widen(range, delta, delta);
                }
                if let Some((low, high)) = cell.target.and_then(|target| ranges[target as usize])
                {
                    range = widen(
                        range,
                        delta.saturating_add(low),
                        delta.saturating_add(high),
                    );
                }
            }
            ranges.push(range);
        }

        let Some((low, high)) = ranges.last().copied().flatten() else {
            return Ok(());
        };
        let clamp = |key: i128| {
            i64::try_from(key).unwrap_or(if key < 0 { i64::MIN } else { i64::MAX })
        };
        if low < 1 {
            return Err(CodecError::MissingResult(clamp(low)));
        }
        if high > results.len() as i128 {
            return Err(CodecError::MissingResult(clamp(high)));
        }
        Ok(())
    }

    /// Append the compact form of one row.
    pub fn write_row(&self, id: StateId, out: &mut Vec<u8>) {
        for cell in self.cells(id) {
            out.push(cell.label);
            write_signed(cell.delta, out);
            write_signed(packed_offset(id, cell), out);
        }
        out.push(ROW_END);
    }

    /// Serialize to the persisted layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.persisted_len());
        out.push(self.encoding.tag());
        if self.cells.is_empty() {
            write_unsigned(0, &mut out);
            return out;
        }
        write_unsigned(self.rows.len() as u64, &mut out);
        for id in 0..self.rows.len() as StateId {
            self.write_row(id, &mut out);
        }
        out
    }

    /// Size of [`Automaton::to_bytes`] without producing it.
    pub fn persisted_len(&self) -> usize {
        if self.cells.is_empty() {
            return 2;
        }
        let mut len = 1 + unsigned_len(self.rows.len() as u64);
        for id in 0..self.rows.len() as StateId {
            for cell in self.cells(id) {
                len += 1 + signed_len(cell.delta) + signed_len(packed_offset(id, cell));
            }
            len += 1;
        }
        len
    }

    /// Decode the persisted layout.
    ///
    /// Every structural rule is checked; a violation is reported as a
    /// [`CodecError`] rather than producing an automaton that could misroute.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let tag = *bytes.first().ok_or(CodecError::Truncated(0))?;
        let encoding = ByteEncoding::from_tag(tag)?;
        let (row_count, used) = read_unsigned(&bytes[1..]).map_err(|e| at(e, 1))?;
        let mut pos = 1 + used;

        if row_count == 0 {
            if pos != bytes.len() {
                return Err(CodecError::TrailingBytes(bytes.len() - pos));
            }
            let mut automaton = Self::empty(encoding);
            automaton.compute_uniqueness();
            return Ok(automaton);
        }
        let row_count = usize::try_from(row_count).map_err(|_| CodecError::Overflow(1))?;
        if row_count > (bytes.len() - pos) / MIN_ROW_BYTES {
            return Err(CodecError::Truncated(bytes.len()));
        }

        let mut rows: Vec<Vec<Cell>> = Vec::with_capacity(row_count);
        for row in 0..row_count {
            let mut cells: Vec<Cell> = Vec::new();
            loop {
                let label = *bytes.get(pos).ok_or(CodecError::Truncated(pos))?;
                pos += 1;
                if label == ROW_END && !cells.is_empty() {
                    break;
                }
                if cells.last().is_some_and(|prev| prev.label >= label) {
                    return Err(CodecError::UnsortedRow(row));
                }
                let (delta, used) = read_signed(&bytes[pos..]).map_err(|e| at(e, pos))?;
                pos += used;
                let (packed, used) = read_signed(&bytes[pos..]).map_err(|e| at(e, pos))?;
                pos += used;

                let offset = packed >> 1;
                let returns = packed & 1 == 1;
                let target = match offset {
                    0 => None,
                    o if o < 0 || o as u64 > row as u64 => {
                        return Err(CodecError::InvalidRowOffset { row, offset: o })
                    }
                    o => Some((row as u64 - o as u64) as StateId),
                };
                if !returns && target.is_none() {
                    return Err(CodecError::DeadTransition(row));
                }
                cells.push(Cell {
                    label,
                    returns,
                    delta,
                    target,
                });
            }
            rows.push(cells);
        }
        if pos != bytes.len() {
            return Err(CodecError::TrailingBytes(bytes.len() - pos));
        }

        let mut automaton = Self::from_rows(encoding, rows);
        automaton.compute_uniqueness();
        tracing::trace!(
            rows = automaton.row_count(),
            cells = automaton.cell_count(),
            bytes = bytes.len(),
            %encoding,
            "automaton decoded"
        );
        Ok(automaton)
    }

    /// Size and shape statistics.
    pub fn stats(&self) -> AutomatonStats {
        let mut rows_by_cell_count = BTreeMap::new();
        for row in &self.rows {
            *rows_by_cell_count
                .entry(row.cell_count as usize)
                .or_insert(0) += 1;
        }
        AutomatonStats {
            rows: self.rows.len(),
            cells: self.cells.len(),
            persisted_bytes: self.persisted_len(),
            max_key_bytes: self.max_key_bytes,
            rows_by_cell_count,
        }
    }
}

fn widen(range: Option<(i128, i128)>, low: i128, high: i128) -> Option<(i128, i128)> {
    Some(match range {
        Some((min, max)) => (min.min(low), max.max(high)),
        None => (low, high),
    })
}

/// Row offset and accepting flag packed the way the persisted layout wants.
fn packed_offset(source: StateId, cell: &Cell) -> i64 {
    let offset = cell
        .target
        .map_or(0, |target| i64::from(source) - i64::from(target));
    (offset << 1) | i64::from(cell.returns)
}

fn at(error: CodecError, base: usize) -> CodecError {
    match error {
        CodecError::Truncated(pos) => CodecError::Truncated(base + pos),
        CodecError::Overflow(pos) => CodecError::Overflow(base + pos),
        other => other,
    }
}

impl fmt::Display for Automaton {
    /// One line per row: `R3{61=2*/R1 62=R0}`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for id in 0..self.rows.len() as StateId {
            write!(f, "R{id}{{")?;
            for (i, cell) in self.cells(id).iter().enumerate() {
                if i > 0 {
                    f.write_str(" ")?;
                }
                write!(f, "{:02X}=", cell.label)?;
                if cell.delta != 0 {
                    write!(f, "{}", cell.delta)?;
                }
                if cell.returns {
                    f.write_str("*")?;
                }
                if let Some(target) = cell.target {
                    if cell.delta != 0 || cell.returns {
                        f.write_str("/")?;
                    }
                    write!(f, "R{target}")?;
                }
            }
            writeln!(f, "}}")?;
        }
        Ok(())
    }
}

/// Shape of an automaton, for diagnostics and benchmarks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutomatonStats {
    /// Number of rows
    pub rows: usize,
    /// Number of cells
    pub cells: usize,
    /// Size of the persisted layout in bytes
    pub persisted_bytes: usize,
    /// Longest encoded key
    pub max_key_bytes: usize,
    /// Histogram: cells per row → number of rows
    pub rows_by_cell_count: BTreeMap<usize, usize>,
}

impl fmt::Display for AutomatonStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "rows:\t{}", self.rows)?;
        writeln!(f, "cells:\t{}", self.cells)?;
        writeln!(f, "persisted bytes:\t{}", self.persisted_bytes)?;
        writeln!(f, "longest key bytes:\t{}", self.max_key_bytes)?;
        for (cells, rows) in &self.rows_by_cell_count {
            writeln!(f, "cells in row=\t{cells}\trows with count=\t{rows}")?;
        }
        Ok(())
    }
}
