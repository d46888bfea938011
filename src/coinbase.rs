use super::*;

#[derive(Clone)]
pub struct CoinbaseBuilder {
    extranonce1: Extranonce,
    height: u64,
    pool_name: String,
    value: Amount,
    payout_script: ScriptBuf,
    witness_commitment: sha256d::Hash,
}

impl CoinbaseBuilder {
    const MAX_COINBASE_SCRIPT_SIG_SIZE: usize = 100;

    pub fn new(
        height: u64,
        value: Amount,
        payout_script: ScriptBuf,
        witness_commitment: sha256d::Hash,
        pool_name: impl Into<String>,
        extranonce1: Extranonce,
    ) -> Self {
        Self {
            extranonce1,
            height,
            pool_name: pool_name.into(),
            value,
            payout_script,
            witness_commitment,
        }
    }

    /// Builds the transaction with a zero-filled extranonce region and the
    /// two hex halves miners splice their extranonce between. `coinb1` ends
    /// immediately before the 8 reserved scriptSig bytes and `coinb2` begins
    /// with the input sequence field.
    pub fn build(self) -> Result<(Transaction, String, String)> {
        let mut script_sig = Vec::with_capacity(Self::MAX_COINBASE_SCRIPT_SIG_SIZE);

        script_sig.extend_from_slice(&encode_height(self.height));
        script_sig.extend_from_slice(format!("/{}/", self.pool_name).as_bytes());

        let script_prefix_size = script_sig.len();

        script_sig.extend_from_slice(self.extranonce1.as_bytes());
        script_sig.extend_from_slice(&[0u8; EXTRANONCE2_SIZE]);

        let script_sig = ScriptBuf::from_bytes(script_sig);
        let script_sig_size = script_sig.len();

        ensure!(
            script_sig_size <= Self::MAX_COINBASE_SCRIPT_SIG_SIZE,
            "Script sig too large is {script_sig_size} bytes (max {})",
            Self::MAX_COINBASE_SCRIPT_SIG_SIZE
        );

        let coinbase = Transaction {
            version: bitcoin::transaction::Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::null(),
                script_sig,
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output: vec![
                TxOut {
                    value: self.value,
                    script_pubkey: self.payout_script,
                },
                TxOut {
                    value: Amount::ZERO,
                    script_pubkey: commitment_script(self.witness_commitment),
                },
            ],
        };

        let total_extranonce_size = self.extranonce1.len() + EXTRANONCE2_SIZE;

        // offset = size of tx version
        //  + size of #inputs
        //  + size of coinbase outpoint
        //  + size of scriptSig length
        //  + size of everything before extranonce1 + extranonce2
        let offset = 4
            + VarInt(coinbase.input.len() as u64).size()
            + 36
            + VarInt(script_sig_size as u64).size()
            + script_prefix_size;

        let bin = consensus::serialize(&coinbase);
        let coinb1 = hex::encode(&bin[..offset]);
        let coinb2 = hex::encode(&bin[offset + total_extranonce_size..]);

        Ok((coinbase, coinb1, coinb2))
    }
}

/// Decodes a reassembled non-witness coinbase and installs the marker, flag,
/// and 32-zero-byte witness stack the block serialization must carry.
pub fn segwit_coinbase(coinbase_bin: &[u8]) -> Result<Transaction> {
    let mut cursor = bitcoin::io::Cursor::new(coinbase_bin);
    let mut coinbase = Transaction::consensus_decode_from_finite_reader(&mut cursor)?;

    ensure!(
        coinbase.input.len() == 1,
        "coinbase must have exactly one input"
    );

    coinbase.input[0].witness = Witness::from_slice(&[stratum::WITNESS_RESERVED_VALUE]);

    Ok(coinbase)
}

/// BIP 34 height push: `0x50 + h` for heights below 17, otherwise a length
/// byte followed by the little-endian height, zero-padded when the top bit of
/// the last byte is set.
pub fn encode_height(height: u64) -> Vec<u8> {
    if height < 17 {
        return vec![0x50 + height as u8];
    }

    let mut data = Vec::new();
    let mut h = height;
    while h > 0 {
        data.push((h & 0xff) as u8);
        h >>= 8;
    }

    if data.last().is_some_and(|byte| byte & 0x80 != 0) {
        data.push(0x00);
    }

    let mut push = Vec::with_capacity(data.len() + 1);
    push.push(data.len() as u8);
    push.extend_from_slice(&data);
    push
}

/// `OP_RETURN OP_PUSHBYTES_36 0xaa21a9ed <commitment>`
fn commitment_script(commitment: sha256d::Hash) -> ScriptBuf {
    let mut script = Vec::with_capacity(38);
    script.extend_from_slice(&[0x6a, 0x24, 0xaa, 0x21, 0xa9, 0xed]);
    script.extend_from_slice(commitment.as_byte_array());
    ScriptBuf::from_bytes(script)
}
