//! Result table: accumulated automaton key → payload.

/// Append-only table of payload values keyed by accumulated automaton keys.
///
/// Keys are 1-based: the n-th pushed value is found under key `n`. The
/// builder pushes values in the byte order of their encoded keys, which is
/// exactly the rank the automaton's deltas accumulate to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultTable<V> {
    values: Vec<V>,
}

impl<V> ResultTable<V> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Create an empty table with room for `capacity` values.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
        }
    }

    /// Rebuild a table from values in key order.
    pub fn from_values(values: Vec<V>) -> Self {
        Self { values }
    }

    /// Append a value and return the key it is stored under.
    pub fn push(&mut self, value: V) -> i64 {
        self.values.push(value);
        self.values.len() as i64
    }

    /// Look up the value for an accumulated key.
    #[inline]
    pub fn get(&self, key: i64) -> Option<&V> {
        let index = usize::try_from(key).ok()?.checked_sub(1)?;
        self.values.get(index)
    }

    /// Whether `key` names an entry.
    pub fn contains_key(&self, key: i64) -> bool {
        self.get(key).is_some()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Values in key order.
    pub fn values(&self) -> &[V] {
        &self.values
    }
}

impl<V> Default for ResultTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_one_based() {
        let mut table = ResultTable::new();
        assert_eq!(table.push("Woman"), 1);
        assert_eq!(table.push("Few"), 2);

        assert_eq!(table.get(1), Some(&"Woman"));
        assert_eq!(table.get(2), Some(&"Few"));
        assert_eq!(table.get(0), None);
        assert_eq!(table.get(3), None);
        assert_eq!(table.get(-1), None);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_from_values() {
        let table = ResultTable::from_values(vec![10, 20]);
        assert!(table.contains_key(2));
        assert!(!table.contains_key(3));
        assert_eq!(table.values(), &[10, 20]);
    }
}
