use super::*;

/// Snapshot of a `getblocktemplate` response. Immutable once taken; the
/// generator replaces it wholesale on every refresh.
#[derive(Clone, PartialEq, Debug, Deserialize)]
pub struct BlockTemplate {
    #[serde(deserialize_with = "version_from_i32")]
    pub version: Version,
    #[serde(rename = "previousblockhash")]
    pub previous_block_hash: BlockHash,
    pub transactions: Vec<TemplateTransaction>,
    #[serde(rename = "coinbasevalue", with = "bitcoin::amount::serde::as_sat")]
    pub coinbase_value: Amount,
    pub bits: Nbits,
    pub height: u64,
    #[serde(rename = "curtime")]
    pub current_time: u64,
}

#[derive(Clone, PartialEq, Debug, Deserialize)]
pub struct TemplateTransaction {
    pub txid: Txid,
    #[serde(rename = "hash")]
    pub wtxid: Wtxid,
    #[serde(rename = "data", deserialize_with = "tx_from_hex")]
    pub transaction: Transaction,
}

#[cfg(test)]
impl BlockTemplate {
    pub(crate) fn example() -> Self {
        Self {
            version: Version::from(0x20000000),
            previous_block_hash:
                "00000000440b921e1b77c6c0487ae5616de67f788f44ae2a5af6e2194d16b6f8"
                    .parse()
                    .unwrap(),
            transactions: Vec::new(),
            coinbase_value: Amount::from_sat(50 * COIN_VALUE),
            bits: "207fffff".parse().unwrap(),
            height: 840_000,
            current_time: 0x68000000,
        }
    }
}

fn version_from_i32<'de, D>(d: D) -> Result<Version, D::Error>
where
    D: Deserializer<'de>,
{
    let version = i32::deserialize(d)?;
    Ok(Version::from(version))
}

fn tx_from_hex<'de, D>(d: D) -> Result<Transaction, D::Error>
where
    D: Deserializer<'de>,
{
    let s = <&str>::deserialize(d)?;
    consensus::encode::deserialize_hex(s).map_err(de::Error::custom)
}
