pub mod config;
pub mod event;
pub mod frame;
pub mod id;
pub mod wire;

use core::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use snafu::Snafu;

/// Seconds since the unix epoch.
///
/// Signed, because the persisted format reserves the full `i64` range and
/// replayed logs may carry timestamps produced by other systems.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const ZERO: Self = Self(0);

    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("System clock before unix epoch")
            .as_secs();
        Self(secs as i64)
    }

    pub const fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    pub const fn as_secs(self) -> i64 {
        self.0
    }

    pub const fn saturating_add_secs(self, secs: i64) -> Self {
        Self(self.0.saturating_add(secs))
    }

    pub const fn seconds_since(self, earlier: Self) -> i64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<i64> for Timestamp {
    fn from(secs: i64) -> Self {
        Self(secs)
    }
}

const IP_TAG_V4: u8 = 0;
const IP_TAG_V6: u8 = 1;

/// An ip address in the fixed 17-byte form used by the event context:
/// one tag byte (0 = v4, 1 = v6) followed by 16 octets (v4 uses the first
/// 4, the rest stay zero).
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct IpAddress {
    tag: u8,
    octets: [u8; 16],
}

impl IpAddress {
    pub const SIZE: usize = 17;

    /// The all-zero v4 address, used for the empty event context.
    pub const ZERO: Self = Self {
        tag: IP_TAG_V4,
        octets: [0u8; 16],
    };

    pub fn to_bytes(self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0] = self.tag;
        bytes[1..].copy_from_slice(&self.octets);
        bytes
    }

    pub fn from_bytes(bytes: [u8; Self::SIZE]) -> Self {
        let mut octets = [0u8; 16];
        octets.copy_from_slice(&bytes[1..]);
        Self {
            // Unknown tags are preserved as v6 so round-trips stay lossless
            // enough for display while never panicking on foreign logs.
            tag: if bytes[0] == IP_TAG_V4 {
                IP_TAG_V4
            } else {
                IP_TAG_V6
            },
            octets,
        }
    }

    pub fn is_v4(self) -> bool {
        self.tag == IP_TAG_V4
    }
}

impl From<std::net::IpAddr> for IpAddress {
    fn from(addr: std::net::IpAddr) -> Self {
        let mut octets = [0u8; 16];
        match addr {
            std::net::IpAddr::V4(v4) => {
                octets[..4].copy_from_slice(&v4.octets());
                Self {
                    tag: IP_TAG_V4,
                    octets,
                }
            }
            std::net::IpAddr::V6(v6) => {
                octets.copy_from_slice(&v6.octets());
                Self {
                    tag: IP_TAG_V6,
                    octets,
                }
            }
        }
    }
}

impl From<IpAddress> for std::net::IpAddr {
    fn from(addr: IpAddress) -> Self {
        if addr.is_v4() {
            let mut v4 = [0u8; 4];
            v4.copy_from_slice(&addr.octets[..4]);
            std::net::IpAddr::V4(v4.into())
        } else {
            std::net::IpAddr::V6(addr.octets.into())
        }
    }
}

impl fmt::Display for IpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        std::net::IpAddr::from(*self).fmt(f)
    }
}

impl fmt::Debug for IpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        <Self as fmt::Display>::fmt(self, f)
    }
}

#[derive(Debug, Snafu)]
#[snafu(display("Not a valid ip address: {input}"))]
pub struct IpAddressParseError {
    input: String,
}

impl FromStr for IpAddress {
    type Err = IpAddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        std::net::IpAddr::from_str(s)
            .map(Into::into)
            .map_err(|_| IpAddressParseError { input: s.into() })
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr as _;

    use super::*;

    #[test_log::test]
    fn ip_address_round_trip() {
        for input in ["127.0.0.1", "0.0.0.0", "255.255.255.255", "::1", "fe80::1234:5678"] {
            let addr = IpAddress::from_str(input).expect("valid address");
            let bytes = addr.to_bytes();
            assert_eq!(bytes.len(), IpAddress::SIZE);
            assert_eq!(IpAddress::from_bytes(bytes), addr);
            assert_eq!(addr.to_string(), input);
        }
    }

    #[test_log::test]
    fn ip_address_zero_is_v4() {
        assert!(IpAddress::ZERO.is_v4());
        assert_eq!(IpAddress::ZERO.to_bytes(), [0u8; 17]);
    }

    #[test_log::test]
    fn timestamp_ordering() {
        assert!(Timestamp::from_secs(1) < Timestamp::from_secs(2));
        assert_eq!(Timestamp::from_secs(5).seconds_since(Timestamp::from_secs(2)), 3);
    }
}
