//! Gzip compression wrapper for serializers.

use std::io::{Read, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{DictionarySerializer, SerializationError};
use crate::dictionary::StateDictionary;

/// Gzip-compressed serializer wrapper.
///
/// Applies gzip compression to any underlying serializer.
///
/// # Example
///
/// ```
/// use statedict::prelude::*;
/// use statedict::serialization::{BincodeSerializer, DictionarySerializer, GzipSerializer};
///
/// let dictionary = StateDictionary::from_pairs([("test", 1u8), ("testing", 2)])?;
///
/// let mut buffer = Vec::new();
/// GzipSerializer::<BincodeSerializer>::serialize(&dictionary, &mut buffer)?;
/// let loaded: StateDictionary<u8> =
///     GzipSerializer::<BincodeSerializer>::deserialize(&buffer[..])?;
/// assert_eq!(loaded.get("testing"), Some(&2));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct GzipSerializer<S> {
    _inner: std::marker::PhantomData<S>,
}

impl<S: DictionarySerializer> DictionarySerializer for GzipSerializer<S> {
    fn serialize<V, W>(dict: &StateDictionary<V>, writer: W) -> Result<(), SerializationError>
    where
        V: Serialize,
        W: Write,
    {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let mut encoder = GzEncoder::new(writer, Compression::default());
        S::serialize(dict, &mut encoder)?;
        encoder.finish().map_err(SerializationError::Io)?;
        Ok(())
    }

    fn deserialize<V, R>(reader: R) -> Result<StateDictionary<V>, SerializationError>
    where
        V: DeserializeOwned + PartialEq,
        R: Read,
    {
        use flate2::read::GzDecoder;

        S::deserialize(GzDecoder::new(reader))
    }
}
