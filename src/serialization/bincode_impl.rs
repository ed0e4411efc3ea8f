//! Bincode serializer for compact binary format.

use std::io::{Read, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{DictionarySerializer, Persisted, PersistedRef, SerializationError};
use crate::dictionary::StateDictionary;

/// Bincode serializer for compact binary format.
///
/// The automaton is stored in its own compact layout as a byte blob, so the
/// file is barely larger than the automaton plus the encoded values.
pub struct BincodeSerializer;

impl DictionarySerializer for BincodeSerializer {
    fn serialize<V, W>(dict: &StateDictionary<V>, mut writer: W) -> Result<(), SerializationError>
    where
        V: Serialize,
        W: Write,
    {
        bincode::serialize_into(&mut writer, &PersistedRef::new(dict))?;
        Ok(())
    }

    fn deserialize<V, R>(mut reader: R) -> Result<StateDictionary<V>, SerializationError>
    where
        V: DeserializeOwned + PartialEq,
        R: Read,
    {
        let persisted: Persisted<V> = bincode::deserialize_from(&mut reader)?;
        persisted.into_dictionary("bincode")
    }
}
