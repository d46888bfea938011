use super::*;

/// The BIP 141 witness reserved value: the single witness stack item of the
/// coinbase input, committed to alongside the witness merkle root.
pub const WITNESS_RESERVED_VALUE: [u8; 32] = [0; 32];

/// Stratum carries merkle branches as hex in the hash's internal byte order,
/// unlike the reversed hex Bitcoin displays txids in.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct MerkleNode(sha256d::Hash);

impl MerkleNode {
    pub fn as_byte_array(&self) -> &[u8; 32] {
        self.0.as_byte_array()
    }

    pub fn from_byte_array(b: [u8; 32]) -> Self {
        Self(sha256d::Hash::from_byte_array(b))
    }

    pub fn from_raw_hash(h: sha256d::Hash) -> Self {
        Self(h)
    }

    pub fn to_raw_hash(self) -> sha256d::Hash {
        self.0
    }

    pub fn all_zeros() -> Self {
        Self(sha256d::Hash::all_zeros())
    }
}

impl Display for MerkleNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0.as_byte_array()))
    }
}

impl FromStr for MerkleNode {
    type Err = InternalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 64 {
            return Err(InternalError::InvalidLength {
                expected: 64,
                actual: s.len(),
            });
        }
        let mut b = [0u8; 32];
        hex::decode_to_slice(s, &mut b).map_err(|source| InternalError::HexParse { source })?;
        Ok(MerkleNode(sha256d::Hash::from_byte_array(b)))
    }
}

impl From<sha256d::Hash> for MerkleNode {
    fn from(h: sha256d::Hash) -> Self {
        Self(h)
    }
}

impl From<MerkleNode> for sha256d::Hash {
    fn from(n: MerkleNode) -> Self {
        n.0
    }
}

impl From<MerkleNode> for bitcoin::TxMerkleNode {
    fn from(n: MerkleNode) -> Self {
        n.0.into()
    }
}

impl From<Txid> for MerkleNode {
    fn from(txid: Txid) -> Self {
        Self::from_byte_array(txid.to_byte_array())
    }
}

fn pair_hash(left: sha256d::Hash, right: sha256d::Hash) -> sha256d::Hash {
    let mut concat = Vec::with_capacity(64);
    concat.extend_from_slice(left.as_byte_array());
    concat.extend_from_slice(right.as_byte_array());
    sha256d::Hash::hash(&concat)
}

fn next_level(level: &[sha256d::Hash]) -> Vec<sha256d::Hash> {
    level
        .chunks(2)
        .map(|pair| pair_hash(pair[0], *pair.get(1).unwrap_or(&pair[0])))
        .collect()
}

/// Constructs the sibling-hash proof for the coinbase at leaf index 0, the
/// form miners fold a reconstructed coinbase txid through. A missing right
/// sibling duplicates the current node.
pub fn merkle_branches(non_coinbase_txids: Vec<Txid>) -> Vec<MerkleNode> {
    if non_coinbase_txids.is_empty() {
        return Vec::new();
    }

    let mut level = vec![sha256d::Hash::all_zeros()];
    level.extend(non_coinbase_txids.iter().map(|txid| txid.to_raw_hash()));

    let mut branches = Vec::new();
    let mut index = 0;

    while level.len() > 1 {
        // XOR to get the sibling on either side
        let sibling_index = index ^ 1;

        let sibling = if sibling_index < level.len() {
            level[sibling_index]
        } else {
            level[index]
        };

        branches.push(sibling.into());

        level = next_level(&level);
        index /= 2;
    }

    branches
}

/// Reassembles the coinbase the miner hashed and folds it through the
/// branches. The coinbase is always the leftmost leaf, so every fold hashes
/// the branch on the right.
pub fn merkle_root(
    coinb1: &str,
    coinb2: &str,
    extranonce1: &Extranonce,
    extranonce2: &Extranonce,
    merkle_branches: &[MerkleNode],
) -> Result<MerkleNode, InternalError> {
    let coinbase_bin = hex::decode(format!("{coinb1}{extranonce1}{extranonce2}{coinb2}"))
        .map_err(|source| InternalError::HexParse { source })?;

    let mut merkle_root = sha256d::Hash::hash(&coinbase_bin);

    for branch in merkle_branches {
        merkle_root = pair_hash(merkle_root, branch.to_raw_hash());
    }

    Ok(MerkleNode::from_raw_hash(merkle_root))
}

/// The BIP 141 commitment placed in the coinbase: the witness merkle root
/// (zero leaf for the coinbase itself) hashed together with the witness
/// reserved value. Stable for the lifetime of a job.
pub fn witness_commitment(wtxids: &[Wtxid]) -> sha256d::Hash {
    let mut level = vec![sha256d::Hash::all_zeros()];
    level.extend(wtxids.iter().map(|wtxid| wtxid.to_raw_hash()));

    while level.len() > 1 {
        level = next_level(&level);
    }

    let mut commitment = Vec::with_capacity(64);
    commitment.extend_from_slice(level[0].as_byte_array());
    commitment.extend_from_slice(&WITNESS_RESERVED_VALUE);

    sha256d::Hash::hash(&commitment)
}
