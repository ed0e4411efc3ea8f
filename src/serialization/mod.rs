//! Dictionary serialization support.
//!
//! A [`StateDictionary`] is persisted as its automaton, in the compact byte
//! layout of [`Automaton::to_bytes`], next to the result values in key order.
//! Loading decodes and validates the automaton, then checks that every
//! accepting path has a value; no rebuild is needed.
//!
//! [`PlainTextSerializer`] is the exception: it writes one `key<TAB>value`
//! line per entry and rebuilds the automaton on load.
//!
//! # Example
//!
//! ```
//! use statedict::prelude::*;
//! use statedict::serialization::{BincodeSerializer, DictionarySerializer};
//!
//! let dictionary = StateDictionary::from_pairs([("man", 1u32), ("many", 2)])?;
//!
//! let mut buffer = Vec::new();
//! BincodeSerializer::serialize(&dictionary, &mut buffer)?;
//! let loaded: StateDictionary<u32> = BincodeSerializer::deserialize(&buffer[..])?;
//!
//! assert_eq!(loaded.get("many"), Some(&2));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::io::{Read, Write};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::codec::CodecError;
use crate::dictionary::{Automaton, BuildError, ResultTable, StateDictionary};

mod bincode_impl;
mod json_impl;
mod plaintext_impl;

#[cfg(feature = "compression")]
mod compression_impl;

pub use self::bincode_impl::BincodeSerializer;
pub use self::json_impl::JsonSerializer;
pub use self::plaintext_impl::PlainTextSerializer;

#[cfg(feature = "compression")]
pub use self::compression_impl::GzipSerializer;

/// Trait for serializing and deserializing dictionaries.
pub trait DictionarySerializer {
    /// Serialize a dictionary to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding the values or writing fails.
    fn serialize<V, W>(dict: &StateDictionary<V>, writer: W) -> Result<(), SerializationError>
    where
        V: Serialize,
        W: Write;

    /// Deserialize a dictionary from a reader.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails, or the data does not describe a
    /// valid dictionary.
    fn deserialize<V, R>(reader: R) -> Result<StateDictionary<V>, SerializationError>
    where
        V: DeserializeOwned + PartialEq,
        R: Read;
}

/// Errors that can occur during serialization/deserialization.
#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    /// Error during bincode serialization
    #[error("Bincode error: {0}")]
    Bincode(#[from] bincode::Error),
    /// Error during JSON serialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The persisted automaton is malformed or does not match its values
    #[error("invalid automaton: {0}")]
    Codec(#[from] CodecError),
    /// Rebuilding from plain entries failed
    #[error("cannot rebuild dictionary: {0}")]
    Build(#[from] BuildError),
    /// A plain-text line could not be parsed
    #[error("line {line}: {message}")]
    Parse {
        /// 1-based line number
        line: usize,
        /// What was wrong with it
        message: String,
    },
}

/// On-disk shape used by the serde-based formats, borrowing the values.
#[derive(Serialize)]
struct PersistedRef<'a, V> {
    automaton: Vec<u8>,
    values: &'a [V],
}

/// Owned counterpart of [`PersistedRef`], with the same field layout.
#[derive(Deserialize)]
struct Persisted<V> {
    automaton: Vec<u8>,
    values: Vec<V>,
}

impl<'a, V> PersistedRef<'a, V> {
    fn new(dict: &'a StateDictionary<V>) -> Self {
        Self {
            automaton: dict.automaton().to_bytes(),
            values: dict.results().values(),
        }
    }
}

impl<V> Persisted<V> {
    fn into_dictionary(
        self,
        format: &'static str,
    ) -> Result<StateDictionary<V>, SerializationError> {
        let automaton = Automaton::from_bytes(&self.automaton)?;
        let dictionary =
            StateDictionary::from_parts(automaton, ResultTable::from_values(self.values))?;
        tracing::debug!(
            format,
            keys = dictionary.len(),
            rows = dictionary.automaton().row_count(),
            automaton_bytes = self.automaton.len(),
            "dictionary loaded"
        );
        Ok(dictionary)
    }
}
