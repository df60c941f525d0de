//! Shared word types for the wordfreq engine.
//!
//! A [`CanonicalWord`] is the aggregation key: lowercase ASCII letters only,
//! at least [`MIN_WORD_LEN`] of them. The only ways to obtain one are
//! [`CanonicalWord::normalize`], which cleans an arbitrary raw token, and
//! [`CanonicalWord::parse_canonical`], which accepts bytes that are already in
//! canonical form (used when decoding transferred tables).
//!
//! ```rust
//! use wordfreq_types::CanonicalWord;
//!
//! let word = CanonicalWord::normalize(b"Don't").unwrap();
//! assert_eq!(word.as_str(), "dont");
//! assert!(CanonicalWord::normalize(b"a1b").is_none());
//! ```

use std::borrow::Borrow;
use std::fmt;

/// Words shorter than this after cleaning are rejected.
pub const MIN_WORD_LEN: usize = 3;

/// Longest alphabetic run a tokenizer will accumulate for a single candidate.
pub const MAX_TOKEN_LEN: usize = 128;

/// Byte classification used everywhere a word boundary is decided.
#[inline]
pub fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphabetic()
}

/// Lowercase, alphabetic-only word of at least [`MIN_WORD_LEN`] letters.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct CanonicalWord(Box<str>);

impl CanonicalWord {
    /// Clean a raw token into its canonical form.
    ///
    /// Every non-alphabetic byte is dropped wherever it occurs, the remaining
    /// letters are lowercased, and the result is rejected if fewer than
    /// [`MIN_WORD_LEN`] letters survive.
    pub fn normalize(raw: &[u8]) -> Option<Self> {
        let cleaned: String = raw
            .iter()
            .copied()
            .filter(|b| is_word_byte(*b))
            .map(|b| char::from(b.to_ascii_lowercase()))
            .collect();
        if cleaned.len() < MIN_WORD_LEN {
            return None;
        }
        Some(Self(cleaned.into_boxed_str()))
    }

    /// Accept bytes only if they are already canonical.
    pub fn parse_canonical(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < MIN_WORD_LEN || !bytes.iter().all(|b| b.is_ascii_lowercase()) {
            return None;
        }
        // All bytes are ASCII lowercase letters, so this cannot fail.
        std::str::from_utf8(bytes)
            .ok()
            .map(|s| Self(s.to_owned().into_boxed_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Canonical words are never empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Borrow<str> for CanonicalWord {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for CanonicalWord {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One line of a top-K report.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RankedEntry {
    pub word: CanonicalWord,
    pub count: u64,
}

impl RankedEntry {
    pub fn new(word: CanonicalWord, count: u64) -> Self {
        Self { word, count }
    }
}

impl fmt::Display for RankedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.word, self.count)
    }
}
