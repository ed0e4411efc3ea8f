//! # statedict
//!
//! Compact, immutable string → value dictionaries backed by a minimized
//! byte-level automaton.
//!
//! Keys are turned into bytes by a [`ByteEncoding`](codec::ByteEncoding),
//! inserted into a trie, and minimized so that common prefixes *and* common
//! suffixes are stored once. Instead of storing payloads on the automaton,
//! every transition carries a delta; summing the deltas along a key yields
//! the index of its payload in a separate result table.
//!
//! Lookups go through a [`Matcher`](dictionary::Matcher) that scans text from
//! an offset, reporting every key it passes, whether the scanned text is a
//! proper prefix of some key, and (when only one key can complete it) which
//! one.
//!
//! ## Example
//!
//! ```
//! use statedict::prelude::*;
//!
//! let dictionary = StateDictionary::from_pairs([
//!     ("man", "Woman"),
//!     ("many", "Few"),
//!     ("manner", "Style"),
//! ])?;
//!
//! let mut matcher = dictionary.matcher("many manners ma");
//! let mut found = Vec::new();
//! while matcher.has_more() {
//!     match matcher.advance_filtered(MatchFilter::LongestUnique) {
//!         MatchStatus::None => matcher.next_offset(),
//!         _ => {
//!             found.push((matcher.match_text().to_string(), matcher.match_value().copied()));
//!             let end = matcher.match_end();
//!             matcher.set_offset(end);
//!         }
//!     }
//! }
//! assert_eq!(
//!     found,
//!     vec![
//!         ("many".to_string(), Some("Few")),
//!         ("manner".to_string(), Some("Style")),
//!     ]
//! );
//!
//! let mut out = String::new();
//! dictionary.matcher("many manners ma").convert(&mut out);
//! assert_eq!(out, "Few Styles ma");
//! # Ok::<(), statedict::dictionary::BuildError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod dictionary;

#[cfg(feature = "serialization")]
pub mod serialization;

/// Common imports for convenient usage
pub mod prelude {
    pub use crate::codec::ByteEncoding;
    pub use crate::dictionary::{
        BuildError, ConvertedText, MatchFilter, MatchStatus, Matcher, SimpleDictionary,
        StateDictionary, StateDictionaryBuilder,
    };

    #[cfg(feature = "serialization")]
    pub use crate::serialization::{
        BincodeSerializer, DictionarySerializer, JsonSerializer, PlainTextSerializer,
        SerializationError,
    };

    #[cfg(feature = "compression")]
    pub use crate::serialization::GzipSerializer;
}
