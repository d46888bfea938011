use super::*;

/// The difficulty-1 target, `0x00000000FFFF0000…0000`, as a 256-bit integer.
pub static DIFFICULTY_1_TARGET: LazyLock<U256> =
    LazyLock::new(|| U256::from_big_endian(&Target::MAX.to_be_bytes()));

/// Share-scale difficulty. The pool hands one of these to each session at
/// subscribe time and scores every submitted header against it: a share is
/// good when the difficulty-1 target divided by the header hash, as integers,
/// reaches the session value.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Difficulty(f64);

impl Difficulty {
    pub fn as_f64(self) -> f64 {
        self.0
    }

    /// The 256-bit target a hash must stay below to meet this difficulty.
    pub fn to_target(self) -> Target {
        assert!(
            self.0.is_finite() && self.0 > 0.0,
            "difficulty must be finite and > 0"
        );

        // 2^32 - 1 is safe: DIFFICULTY_1_TARGET (just under 2^224) times the
        // scale stays within 256 bits.
        const MAX_SCALE: u64 = 0xFFFF_FFFF;

        let max_by_den = (u64::MAX as f64 / self.0).floor();
        let scale = max_by_den.min(MAX_SCALE as f64).max(1.0) as u64;

        let numerator = (*DIFFICULTY_1_TARGET).saturating_mul(U256::from(scale));
        let denominator = (self.0 * scale as f64).round() as u64;

        let target = if denominator == 0 {
            U256::MAX
        } else {
            numerator / U256::from(denominator)
        };

        Target::from_be_bytes(target.to_big_endian())
    }
}

impl From<u64> for Difficulty {
    fn from(difficulty: u64) -> Self {
        assert!(difficulty > 0, "difficulty must be > 0");
        Difficulty(difficulty as f64)
    }
}

impl From<f64> for Difficulty {
    fn from(difficulty: f64) -> Self {
        assert!(
            difficulty.is_finite() && difficulty > 0.0,
            "difficulty must be finite and > 0"
        );
        Difficulty(difficulty)
    }
}

impl Serialize for Difficulty {
    fn serialize<S: Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
        if self.0 < 1.0 {
            ser.serialize_f64(self.0)
        } else {
            ser.serialize_u64(self.0.floor() as u64)
        }
    }
}

impl<'de> Deserialize<'de> for Difficulty {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Int(u64),
            Float(f64),
        }

        match Wire::deserialize(de)? {
            Wire::Int(u) => {
                if u == 0 {
                    return Err(de::Error::custom("difficulty must be > 0"));
                }
                Ok(Difficulty::from(u))
            }
            Wire::Float(x) => {
                if !x.is_finite() || x <= 0.0 {
                    return Err(de::Error::custom("difficulty must be finite and > 0"));
                }
                Ok(Difficulty::from(x))
            }
        }
    }
}

impl Display for Difficulty {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0 >= 1.0 && self.0.fract() == 0.0 {
            write!(f, "{}", self.0 as u64)
        } else {
            let s = format!("{:.8}", self.0);
            f.write_str(s.trim_end_matches('0').trim_end_matches('.'))
        }
    }
}

impl FromStr for Difficulty {
    type Err = InternalError;

    fn from_str(difficulty: &str) -> Result<Self, Self::Err> {
        let difficulty = difficulty.trim();

        if difficulty.is_empty() {
            return Err(InternalError::InvalidValue {
                reason: "difficulty string is empty".to_string(),
            });
        }

        if let Ok(u) = difficulty.parse::<u64>() {
            if u == 0 {
                return Err(InternalError::InvalidValue {
                    reason: "difficulty must be > 0".to_string(),
                });
            }
            return Ok(Difficulty::from(u));
        }

        if let Ok(x) = difficulty.parse::<f64>() {
            if !x.is_finite() || x <= 0.0 {
                return Err(InternalError::InvalidValue {
                    reason: "difficulty must be > 0".to_string(),
                });
            }
            return Ok(Difficulty::from(x));
        }

        Err(InternalError::Parse {
            message: "difficulty must be an integer or float".to_string(),
        })
    }
}

/// The difficulty a submitted header achieved: the difficulty-1 target
/// divided by the header hash interpreted as a little-endian 256-bit integer.
/// The division is integer division; a zero hash counts as zero.
pub fn share_difficulty(hash: BlockHash) -> f64 {
    let value = U256::from_little_endian(&hash.to_byte_array());

    if value.is_zero() {
        return 0.0;
    }

    u256_to_f64(*DIFFICULTY_1_TARGET / value)
}

/// Network difficulty corresponding to a compact-bits target.
pub fn network_difficulty(nbits: Nbits) -> f64 {
    let target = U256::from_big_endian(&nbits.to_target().to_be_bytes());

    if target.is_zero() {
        return 0.0;
    }

    u256_to_f64(*DIFFICULTY_1_TARGET / target)
}

fn u256_to_f64(value: U256) -> f64 {
    value
        .0
        .iter()
        .enumerate()
        .map(|(i, limb)| *limb as f64 * 2f64.powi(64 * i as i32))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash_for_target(target: Target) -> BlockHash {
        BlockHash::from_byte_array(target.to_le_bytes())
    }

    #[test]
    fn difficulty_1_round_trip() {
        assert_eq!(share_difficulty(hash_for_target(Target::MAX)), 1.0);
    }

    #[test]
    fn halving_the_hash_doubles_the_difficulty() {
        let half = *DIFFICULTY_1_TARGET / U256::from(2u64);
        let hash = BlockHash::from_byte_array({
            let mut le = half.to_big_endian();
            le.reverse();
            le
        });

        assert_eq!(share_difficulty(hash), 2.0);
    }

    #[test]
    fn division_truncates() {
        let above = *DIFFICULTY_1_TARGET + U256::from(1u64);
        let hash = BlockHash::from_byte_array({
            let mut le = above.to_big_endian();
            le.reverse();
            le
        });

        assert_eq!(share_difficulty(hash), 0.0);
    }

    #[test]
    fn zero_hash_is_zero_difficulty() {
        assert_eq!(share_difficulty(BlockHash::all_zeros()), 0.0);
    }

    #[test]
    fn network_difficulty_of_genesis_bits_is_1() {
        assert_eq!(network_difficulty("1d00ffff".parse().unwrap()), 1.0);
    }

    #[test]
    fn difficulty_1_target_matches_the_known_constant() {
        let want = U256::from_big_endian(
            &<[u8; 32]>::try_from(
                hex::decode("00000000ffff0000000000000000000000000000000000000000000000000000")
                    .unwrap(),
            )
            .unwrap(),
        );
        assert_eq!(*DIFFICULTY_1_TARGET, want);
    }

    #[test]
    fn to_target_inverts_difficulty_1() {
        assert_eq!(Difficulty::from(1).to_target(), Target::MAX);
        assert_eq!(Difficulty::from(1.0).to_target(), Target::MAX);
    }

    #[test]
    fn to_target_scales_fractional_difficulties() {
        let target = Difficulty::from(0.5).to_target();
        let value = u256_to_f64(U256::from_big_endian(&target.to_be_bytes()));
        let want = u256_to_f64(*DIFFICULTY_1_TARGET) * 2.0;
        assert!(
            ((value - want) / want).abs() < 1e-6,
            "target for difficulty 0.5 should be twice the difficulty-1 target"
        );
    }

    #[test]
    fn serialize_int_when_at_least_1() {
        assert_eq!(serde_json::to_string(&Difficulty::from(64)).unwrap(), "64");
        assert_eq!(
            serde_json::to_string(&Difficulty::from(0.5)).unwrap(),
            "0.5"
        );
    }

    #[test]
    fn deserialize_from_int_or_float() {
        assert_eq!(
            serde_json::from_str::<Difficulty>("2").unwrap(),
            Difficulty::from(2)
        );
        assert_eq!(
            serde_json::from_str::<Difficulty>("0.125").unwrap(),
            Difficulty::from(0.125)
        );
    }

    #[test]
    fn serde_rejects_bad_inputs() {
        for diff in ["0", "0.0", "-1", "-0.001"] {
            assert!(
                serde_json::from_str::<Difficulty>(diff).is_err(),
                "should reject {diff}"
            );
        }
    }

    #[test]
    fn from_str_int_float_scientific() {
        assert_eq!(
            Difficulty::from_str("1e6").unwrap(),
            Difficulty::from(1_000_000.0)
        );
        assert_eq!(Difficulty::from_str("64").unwrap(), Difficulty::from(64));
        assert_eq!(
            Difficulty::from_str("0.125").unwrap(),
            Difficulty::from(0.125)
        );
    }

    #[test]
    fn from_str_rejects_bad() {
        for s in ["", "0", "0.0", "-1", "NaN", "Infinity", "nope"] {
            assert!(Difficulty::from_str(s).is_err(), "should reject {s}");
        }
    }

    #[test]
    fn display() {
        assert_eq!(Difficulty::from(64).to_string(), "64");
        assert_eq!(Difficulty::from(0.5).to_string(), "0.5");
        assert_eq!(Difficulty::from(2.25).to_string(), "2.25");
    }
}
