use super::*;

/// The previous block hash as Stratum wires it: the hash bytes reversed and
/// then every 4-byte word swapped back to big endian. Legacy miners expect
/// exactly this double transformation.
#[derive(Debug, PartialEq, Eq, Clone, DeserializeFromStr, SerializeDisplay)]
pub struct PrevHash(BlockHash);

impl FromStr for PrevHash {
    type Err = InternalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 64 {
            return Err(InternalError::InvalidLength {
                expected: 64,
                actual: s.len(),
            });
        }

        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|source| InternalError::HexParse { source })?;

        let mut reordered = [0u8; 32];
        for (src, dst) in bytes.chunks_exact(4).zip(reordered.chunks_mut(4)) {
            let word = BigEndian::read_u32(src);
            LittleEndian::write_u32(dst, word);
        }

        Ok(PrevHash(BlockHash::from_byte_array(reordered)))
    }
}

impl Display for PrevHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut swapped = [0u8; 32];
        for (src, dst) in self
            .0
            .as_byte_array()
            .chunks_exact(4)
            .zip(swapped.chunks_mut(4))
        {
            let word = LittleEndian::read_u32(src);
            BigEndian::write_u32(dst, word);
        }

        write!(f, "{}", hex::encode(swapped))
    }
}

impl From<BlockHash> for PrevHash {
    fn from(blockhash: BlockHash) -> Self {
        PrevHash(blockhash)
    }
}

impl From<PrevHash> for BlockHash {
    fn from(prevhash: PrevHash) -> Self {
        prevhash.0
    }
}
