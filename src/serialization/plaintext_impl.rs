//! Plain text serialization for dictionaries.
//!
//! Serializes dictionaries as newline-delimited UTF-8 text, one entry per
//! line. This is the most human-readable format, suitable for manual editing
//! and version control.
//!
//! # Format
//!
//! The first line names the byte encoding. Every following line holds a key,
//! a tab, and the value as compact JSON:
//!
//! ```text
//! # encoding: compact-delta
//! man	"Woman"
//! manner	"Style"
//! many	"Few"
//! ```
//!
//! Backslash, tab, carriage return and newline inside keys are escaped as
//! `\\`, `\t`, `\r` and `\n`. Empty lines are skipped. A missing header
//! means the default encoding.

use std::io::{BufRead, BufReader, Read, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{DictionarySerializer, SerializationError};
use crate::codec::ByteEncoding;
use crate::dictionary::{StateDictionary, StateDictionaryBuilder};

const HEADER_PREFIX: &str = "# encoding: ";

/// Plain text serializer using `key<TAB>value` lines.
///
/// Loading rebuilds the automaton through [`StateDictionaryBuilder`], so a
/// hand-edited file is minimized like any other input.
pub struct PlainTextSerializer;

impl DictionarySerializer for PlainTextSerializer {
    fn serialize<V, W>(dict: &StateDictionary<V>, mut writer: W) -> Result<(), SerializationError>
    where
        V: Serialize,
        W: Write,
    {
        writeln!(writer, "{HEADER_PREFIX}{}", dict.encoding())?;
        for (key, value) in dict.entries()? {
            writeln!(writer, "{}\t{}", escape(&key), serde_json::to_string(value)?)?;
        }
        Ok(())
    }

    fn deserialize<V, R>(reader: R) -> Result<StateDictionary<V>, SerializationError>
    where
        V: DeserializeOwned + PartialEq,
        R: Read,
    {
        let mut builder = StateDictionaryBuilder::new();
        let mut encoding = ByteEncoding::default();

        for (index, line) in BufReader::new(reader).lines().enumerate() {
            let line = line?;
            let number = index + 1;
            if line.is_empty() {
                continue;
            }
            if index == 0 {
                if let Some(name) = line.strip_prefix(HEADER_PREFIX) {
                    encoding = parse_encoding(name).ok_or_else(|| SerializationError::Parse {
                        line: number,
                        message: format!("unknown encoding {name:?}"),
                    })?;
                    continue;
                }
            }

            let (key, value) = line.split_once('\t').ok_or_else(|| SerializationError::Parse {
                line: number,
                message: "expected key<TAB>value".to_string(),
            })?;
            let key = unescape(key).map_err(|message| SerializationError::Parse {
                line: number,
                message,
            })?;
            let value: V = serde_json::from_str(value)?;
            builder.insert(key, value)?;
        }

        let dictionary = builder.encoding(encoding).build()?;
        tracing::debug!(
            format = "plaintext",
            keys = dictionary.len(),
            rows = dictionary.automaton().row_count(),
            "dictionary loaded"
        );
        Ok(dictionary)
    }
}

fn parse_encoding(name: &str) -> Option<ByteEncoding> {
    [
        ByteEncoding::Utf8,
        ByteEncoding::Compact,
        ByteEncoding::CompactDelta,
    ]
    .into_iter()
    .find(|encoding| encoding.to_string() == name.trim())
}

fn escape(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for ch in key.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out
}

fn unescape(key: &str) -> Result<String, String> {
    let mut out = String::with_capacity(key.len());
    let mut chars = key.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some(other) => return Err(format!("unknown escape \\{other}")),
            None => return Err("dangling backslash".to_string()),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plaintext_roundtrip() {
        let mut builder = StateDictionary::builder().encoding(ByteEncoding::Utf8);
        builder
            .extend([("apple", 1), ("banana", 2), ("tab\there", 3), ("back\\slash", 4)])
            .unwrap();
        let dict = builder.build().unwrap();
        let mut buffer = Vec::new();

        PlainTextSerializer::serialize(&dict, &mut buffer).unwrap();
        let loaded: StateDictionary<i32> = PlainTextSerializer::deserialize(&buffer[..]).unwrap();

        assert_eq!(loaded.encoding(), ByteEncoding::Utf8);
        assert_eq!(loaded.get("apple"), Some(&1));
        assert_eq!(loaded.get("tab\there"), Some(&3));
        assert_eq!(loaded.get("back\\slash"), Some(&4));
        assert_eq!(loaded.automaton(), dict.automaton());
    }

    #[test]
    fn test_plaintext_format() {
        let dict = StateDictionary::from_pairs([("man", "Woman"), ("many", "Few")]).unwrap();
        let mut buffer = Vec::new();

        PlainTextSerializer::serialize(&dict, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert_eq!(
            text,
            "# encoding: compact-delta\nman\t\"Woman\"\nmany\t\"Few\"\n"
        );
    }

    #[test]
    fn test_plaintext_hand_written_input() {
        let input = "apple\t1\n\nbanana\t2\n\ncafé\t3\n".as_bytes();
        let loaded: StateDictionary<u32> = PlainTextSerializer::deserialize(input).unwrap();

        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.encoding(), ByteEncoding::CompactDelta);
        assert_eq!(loaded.get("café"), Some(&3));
    }

    #[test]
    fn test_plaintext_errors() {
        let missing_tab = "# encoding: utf8\napple\n".as_bytes();
        let result: Result<StateDictionary<u32>, _> = PlainTextSerializer::deserialize(missing_tab);
        assert!(matches!(result, Err(SerializationError::Parse { line: 2, .. })));

        let bad_escape = "a\\qb\t1\n".as_bytes();
        let result: Result<StateDictionary<u32>, _> = PlainTextSerializer::deserialize(bad_escape);
        assert!(matches!(result, Err(SerializationError::Parse { line: 1, .. })));

        let conflict = "a\t1\na\t2\n".as_bytes();
        let result: Result<StateDictionary<u32>, _> = PlainTextSerializer::deserialize(conflict);
        assert!(matches!(result, Err(SerializationError::Build(_))));

        let bad_header = "# encoding: ebcdic\n".as_bytes();
        let result: Result<StateDictionary<u32>, _> = PlainTextSerializer::deserialize(bad_header);
        assert!(matches!(result, Err(SerializationError::Parse { line: 1, .. })));
    }

    #[test]
    fn test_escape_roundtrip() {
        for key in ["plain", "a\tb", "line\nbreak", "\\t literal", "cr\r"] {
            assert_eq!(unescape(&escape(key)).unwrap(), key);
        }
    }
}
