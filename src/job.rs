use super::*;

/// One unit of work derived from a block template, shared by every session.
/// The wire-form header fields, the coinbase-position merkle branch, and the
/// witness commitment are computed once here; only the coinbase halves are
/// per-session.
#[derive(Debug, Clone)]
pub struct Job {
    pub job_id: JobId,
    pub clean_jobs: bool,
    pub prevhash: PrevHash,
    pub ntime: Ntime,
    pub merkle_branches: Vec<MerkleNode>,
    pub witness_commitment: sha256d::Hash,
    pub network_target: Target,
    pub template: Arc<BlockTemplate>,
}

impl Job {
    pub fn new(template: Arc<BlockTemplate>, job_id: JobId, clean_jobs: bool) -> Result<Self> {
        let merkle_branches = stratum::merkle_branches(
            template.transactions.iter().map(|tx| tx.txid).collect(),
        );

        let witness_commitment = stratum::witness_commitment(
            &template
                .transactions
                .iter()
                .map(|tx| tx.wtxid)
                .collect::<Vec<Wtxid>>(),
        );

        Ok(Self {
            job_id,
            clean_jobs,
            prevhash: template.previous_block_hash.into(),
            ntime: Ntime::try_from(template.current_time)
                .context("template curtime does not fit in 32 bits")?,
            merkle_branches,
            witness_commitment,
            network_target: template.bits.to_target(),
            template,
        })
    }

    pub fn version(&self) -> Version {
        self.template.version
    }

    pub fn nbits(&self) -> Nbits {
        self.template.bits
    }

    pub fn height(&self) -> u64 {
        self.template.height
    }

    /// The per-session coinbase for this work unit.
    pub fn coinbase_builder(
        &self,
        pool_name: impl Into<String>,
        payout_script: ScriptBuf,
        extranonce1: Extranonce,
    ) -> CoinbaseBuilder {
        CoinbaseBuilder::new(
            self.template.height,
            self.template.coinbase_value,
            payout_script,
            self.witness_commitment,
            pool_name,
            extranonce1,
        )
    }

    pub fn notify(&self, coinb1: String, coinb2: String, clean_jobs: bool) -> Notify {
        Notify {
            job_id: self.job_id,
            prevhash: self.prevhash.clone(),
            coinb1,
            coinb2,
            merkle_branches: self.merkle_branches.clone(),
            version: self.version(),
            nbits: self.nbits(),
            ntime: self.ntime,
            clean_jobs,
        }
    }
}
