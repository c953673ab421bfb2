//! Collation keys for name orderings.
//!
//! Names are ordered (and checked for uniqueness) by a precomputed,
//! case- and accent-insensitive byte key stored next to the string, so
//! index comparisons stay byte-lexicographic. The key is NFKD
//! decomposition with combining marks stripped and Unicode lowercasing
//! applied; a total function, so every string has a stable position.

use core::fmt;

use unicode_normalization::UnicodeNormalization as _;
use unicode_normalization::char::is_combining_mark;

/// A collation key; ordering on it approximates primary-strength
/// collation ("Alice" and "alice" compare equal, "élan" sorts with
/// "elan").
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SortKey(Box<[u8]>);

impl SortKey {
    pub fn of(value: &str) -> Self {
        let folded: String = value
            .nfkd()
            .filter(|c| !is_combining_mark(*c))
            .flat_map(char::to_lowercase)
            .collect();
        Self(folded.into_bytes().into_boxed_slice())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SortKey({})", String::from_utf8_lossy(&self.0))
    }
}

/// A string bundled with its collation key.
#[derive(Clone, Debug)]
pub struct CollatedString {
    value: String,
    key: SortKey,
}

impl CollatedString {
    pub fn new(value: String) -> Self {
        let key = SortKey::of(&value);
        Self { value, key }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn key(&self) -> &SortKey {
        &self.key
    }
}

impl fmt::Display for CollatedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl From<&str> for CollatedString {
    fn from(value: &str) -> Self {
        Self::new(value.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn case_insensitive_equality() {
        assert_eq!(SortKey::of("alice"), SortKey::of("Alice"));
        assert_eq!(SortKey::of("ALICE"), SortKey::of("alice"));
        assert_ne!(SortKey::of("alice"), SortKey::of("alicia"));
    }

    #[test_log::test]
    fn accent_insensitive_equality() {
        assert_eq!(SortKey::of("élan"), SortKey::of("elan"));
        assert_eq!(SortKey::of("Über"), SortKey::of("uber"));
    }

    #[test_log::test]
    fn ordering_is_byte_lexicographic_on_keys() {
        let mut names = ["Zoe", "alice", "Bob", "Émile"];
        names.sort_by_key(|n| SortKey::of(n));
        assert_eq!(names, ["alice", "Bob", "Émile", "Zoe"]);
    }

    #[test_log::test]
    fn empty_string_has_smallest_key() {
        assert!(SortKey::of("") < SortKey::of("a"));
    }
}
