use core::fmt;
use std::str::FromStr;

use rand::Rng as _;
use snafu::{OptionExt as _, Snafu};

/// A 128-bit entity id.
///
/// Compared as bytes; rendered as dashed lowercase hex (36 chars) and
/// parsed from either the dashed or the compact (32 char) form. Freshly
/// minted ids are random with the RFC 4122 version/variant bits set.
#[derive(Copy, Clone, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub struct ForumId([u8; 16]);

impl ForumId {
    pub const SIZE: usize = 16;
    /// The "anonymous / not set" sentinel.
    pub const ZERO: Self = Self([0u8; 16]);

    pub const DASHED_LEN: usize = 36;
    pub const COMPACT_LEN: usize = 32;

    pub fn generate() -> Self {
        let mut bytes: [u8; 16] = rand::rng().random();
        bytes[6] = (bytes[6] & 0x0f) | 0x40;
        bytes[8] = (bytes[8] & 0x3f) | 0x80;
        Self(bytes)
    }

    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub const fn to_bytes(self) -> [u8; 16] {
        self.0
    }

    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }

    pub fn is_zero(self) -> bool {
        self == Self::ZERO
    }

    /// The 32-char undashed lowercase hex form.
    pub fn to_compact_string(self) -> String {
        data_encoding::HEXLOWER.encode(&self.0)
    }

    fn from_compact_str(s: &str) -> Result<Self, ForumIdParseError> {
        let bytes = data_encoding::HEXLOWER_PERMISSIVE
            .decode(s.as_bytes())
            .ok()
            .context(InvalidHexDigitSnafu)?;
        Ok(Self(bytes.try_into().expect("Just checked length")))
    }

    fn from_dashed_str(s: &str) -> Result<Self, ForumIdParseError> {
        let bytes = s.as_bytes();
        for &pos in &[8, 13, 18, 23] {
            if bytes[pos] != b'-' {
                return Err(MissingDashSnafu.build());
            }
        }
        let compact: String = s.chars().filter(|c| *c != '-').collect();
        if compact.len() != Self::COMPACT_LEN {
            return Err(InvalidLengthSnafu.build());
        }
        Self::from_compact_str(&compact)
    }
}

#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
pub enum ForumIdParseError {
    InvalidLength,
    InvalidHexDigit,
    MissingDash,
}

impl FromStr for ForumId {
    type Err = ForumIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.len() {
            Self::COMPACT_LEN => Self::from_compact_str(s),
            Self::DASHED_LEN => Self::from_dashed_str(s),
            _ => Err(InvalidLengthSnafu.build()),
        }
    }
}

impl fmt::Display for ForumId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const HEX: &[u8; 16] = b"0123456789abcdef";
        let mut out = [0u8; ForumId::DASHED_LEN];
        let mut at = 0;
        for (i, byte) in self.0.iter().enumerate() {
            if matches!(i, 4 | 6 | 8 | 10) {
                out[at] = b'-';
                at += 1;
            }
            out[at] = HEX[usize::from(byte >> 4)];
            out[at + 1] = HEX[usize::from(byte & 0xf)];
            at += 2;
        }
        f.write_str(std::str::from_utf8(&out).expect("Just built from hex digits"))
    }
}

impl fmt::Debug for ForumId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        <Self as fmt::Display>::fmt(self, f)
    }
}

impl Default for ForumId {
    fn default() -> Self {
        Self::ZERO
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr as _;

    use super::*;

    #[test_log::test]
    fn dashed_form_round_trips() {
        for _ in 0..32 {
            let id = ForumId::generate();
            let dashed = id.to_string();
            assert_eq!(dashed.len(), ForumId::DASHED_LEN);
            assert_eq!(ForumId::from_str(&dashed).expect("parses"), id);
        }
    }

    #[test_log::test]
    fn compact_form_round_trips() {
        for _ in 0..32 {
            let id = ForumId::generate();
            let compact = id.to_compact_string();
            assert_eq!(compact.len(), ForumId::COMPACT_LEN);
            assert_eq!(ForumId::from_str(&compact).expect("parses"), id);
        }
    }

    #[test_log::test]
    fn known_value() {
        let id = ForumId::from_bytes([
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd,
            0xee, 0xff,
        ]);
        assert_eq!(id.to_string(), "00112233-4455-6677-8899-aabbccddeeff");
        assert_eq!(id.to_compact_string(), "00112233445566778899aabbccddeeff");
        assert_eq!(
            ForumId::from_str("00112233-4455-6677-8899-aabbccddeeff").expect("parses"),
            id
        );
    }

    #[test_log::test]
    fn rejects_malformed() {
        assert!(ForumId::from_str("").is_err());
        assert!(ForumId::from_str("00112233-4455-6677-8899").is_err());
        assert!(ForumId::from_str("zz112233445566778899aabbccddeeff").is_err());
        assert!(ForumId::from_str("00112233x4455x6677x8899xaabbccddeeff").is_err());
    }

    #[test_log::test]
    fn generated_ids_are_v4() {
        let id = ForumId::generate();
        let bytes = id.to_bytes();
        assert_eq!(bytes[6] >> 4, 4);
        assert_eq!(bytes[8] >> 6, 0b10);
    }
}
