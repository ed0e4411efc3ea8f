//! JSON serializer for human-readable format.

use std::io::{Read, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{DictionarySerializer, Persisted, PersistedRef, SerializationError};
use crate::dictionary::StateDictionary;

/// JSON serializer for human-readable format.
///
/// Values stay readable; the automaton is an array of byte values. Use
/// [`PlainTextSerializer`](super::PlainTextSerializer) when the keys should
/// be readable too.
pub struct JsonSerializer;

impl DictionarySerializer for JsonSerializer {
    fn serialize<V, W>(dict: &StateDictionary<V>, mut writer: W) -> Result<(), SerializationError>
    where
        V: Serialize,
        W: Write,
    {
        serde_json::to_writer(&mut writer, &PersistedRef::new(dict))?;
        Ok(())
    }

    fn deserialize<V, R>(mut reader: R) -> Result<StateDictionary<V>, SerializationError>
    where
        V: DeserializeOwned + PartialEq,
        R: Read,
    {
        let persisted: Persisted<V> = serde_json::from_reader(&mut reader)?;
        persisted.into_dictionary("json")
    }
}
