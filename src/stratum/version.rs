use super::*;

use std::ops::{BitAnd, BitOr, BitXor, Not};

#[derive(Debug, Clone, Copy, PartialEq, Eq, DeserializeFromStr, SerializeDisplay)]
pub struct Version(pub block::Version);

impl FromStr for Version {
    type Err = InternalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let n = u32::from_str_radix(s, 16).map_err(|e| InternalError::Parse {
            message: format!("invalid version hex string '{s}': {e}"),
        })?;
        // The as conversion matches Bitcoin's behaviour
        Ok(Self(block::Version::from_consensus(n as i32)))
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0.to_consensus())
    }
}

impl From<block::Version> for Version {
    fn from(v: block::Version) -> Self {
        Self(v)
    }
}

impl From<Version> for block::Version {
    fn from(v: Version) -> Self {
        v.0
    }
}

impl From<i32> for Version {
    fn from(value: i32) -> Self {
        Self(block::Version::from_consensus(value))
    }
}

impl BitAnd for Version {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(block::Version::from_consensus(
            self.0.to_consensus() & rhs.0.to_consensus(),
        ))
    }
}

impl BitOr for Version {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(block::Version::from_consensus(
            self.0.to_consensus() | rhs.0.to_consensus(),
        ))
    }
}

impl BitXor for Version {
    type Output = Self;
    fn bitxor(self, rhs: Self) -> Self {
        Self(block::Version::from_consensus(
            self.0.to_consensus() ^ rhs.0.to_consensus(),
        ))
    }
}

impl Not for Version {
    type Output = Self;
    fn not(self) -> Self {
        Self(block::Version::from_consensus(!self.0.to_consensus()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[track_caller]
    fn case(version_str: &str, expected_consensus: i32) {
        let version = Version::from_str(version_str).unwrap();

        assert_eq!(version.to_string(), version_str, "Display round-trip");
        assert_eq!(version.0.to_consensus(), expected_consensus);

        let serialized = serde_json::to_string(&version).unwrap();
        assert_eq!(serialized, format!("\"{version_str}\""));
        assert_eq!(
            serde_json::from_str::<Version>(&serialized).unwrap(),
            version
        );
    }

    #[test]
    fn bip9_signaling_default() {
        case("20000000", 0x20000000);
    }

    #[test]
    fn negative_consensus_value() {
        case("ffffffff", -1);
    }

    #[test]
    fn feature_bits_set() {
        case("20000002", 0x20000002);
    }

    #[test]
    fn rolling_applies_under_the_mask() {
        let base = Version::from_str("20000000").unwrap();
        let bits = Version::from_str("00002000").unwrap();
        let mask = *VERSION_MASK;

        assert_eq!(base ^ (bits & mask), Version::from(0x20002000));

        let disallowed = Version::from_str("60000000").unwrap();
        assert_eq!(base ^ (disallowed & mask), base);
    }
}
