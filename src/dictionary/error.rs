//! Error types for dictionary construction.

use thiserror::Error;

use super::automaton::StateId;
use crate::codec::CodecError;

/// Errors that abort building a dictionary.
///
/// None of these leave a partially built dictionary behind: a build either
/// publishes a consistent automaton or returns one of these.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// The empty string cannot be stored.
    ///
    /// Keys are recognized on their last transition, and the empty key has
    /// none.
    #[error("the empty string cannot be a dictionary key")]
    EmptyKey,

    /// A key was inserted again with a different value.
    #[error("key {key:?} is already bound to a different value")]
    ConflictingValue {
        /// The re-bound key
        key: String,
    },

    /// Canonical numbering produced a transition to a later row.
    #[error("row {row} points forward to row {target}")]
    ForwardReference {
        /// Row holding the offending transition
        row: StateId,
        /// Row it points to
        target: StateId,
    },

    /// The finished automaton failed a consistency check.
    #[error("inconsistent automaton: {0}")]
    Codec(#[from] CodecError),
}

/// A specialized `Result` type for dictionary construction.
pub type Result<T> = std::result::Result<T, BuildError>;
