use {
    bitcoin::{
        Amount, Transaction, Txid, Wtxid,
        consensus,
        hashes::{Hash, sha256d},
    },
    std::sync::Arc,
    stope::{
        address::script_pubkey,
        block_template::{BlockTemplate, TemplateTransaction},
        job::Job,
        ledger::Ledger,
        stratum::{self, Extranonce, JobId},
    },
};

const RAW_TX: &str = "01000000010000000000000000000000000000000000000000000000000000000000000000ffffffff00ffffffff0100f2052a010000000000000000";

fn template_transaction(n: u32) -> TemplateTransaction {
    // the txid only matters as a merkle leaf, so synthetic values serve
    let id = format!("{n:064x}");

    TemplateTransaction {
        txid: id.parse::<Txid>().unwrap(),
        wtxid: id.parse::<Wtxid>().unwrap(),
        transaction: consensus::encode::deserialize_hex(RAW_TX).unwrap(),
    }
}

fn template(transactions: usize) -> Arc<BlockTemplate> {
    Arc::new(BlockTemplate {
        version: stratum::Version::from(0x20000000),
        previous_block_hash: "00000000440b921e1b77c6c0487ae5616de67f788f44ae2a5af6e2194d16b6f8"
            .parse()
            .unwrap(),
        transactions: (1..=transactions as u32).map(template_transaction).collect(),
        coinbase_value: Amount::from_sat(312_500_000),
        bits: "170362df".parse().unwrap(),
        height: 890_123,
        current_time: 0x67e41692,
    })
}

fn halves(job: &Job, extranonce1: &Extranonce) -> (String, String) {
    let (_, coinb1, coinb2) = job
        .coinbase_builder(
            "WERNERPOOL",
            script_pubkey("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4"),
            extranonce1.clone(),
        )
        .build()
        .unwrap();

    (coinb1, coinb2)
}

#[test]
fn miner_reconstructs_the_merkle_root_the_pool_expects() {
    for transactions in [0, 1, 2, 3, 5, 12] {
        let template = template(transactions);
        let job = Job::new(template.clone(), JobId::new(1), true).unwrap();

        let extranonce1: Extranonce = "00000001".parse().unwrap();
        let extranonce2: Extranonce = "cafef00d".parse().unwrap();
        let (coinb1, coinb2) = halves(&job, &extranonce1);

        // what the miner does with the notify fields
        let folded = stratum::merkle_root(
            &coinb1,
            &coinb2,
            &extranonce1,
            &extranonce2,
            &job.merkle_branches,
        )
        .unwrap()
        .to_raw_hash();

        // the full tree over [coinbase txid, txids...]
        let coinbase_bin =
            hex::decode(format!("{coinb1}{extranonce1}{extranonce2}{coinb2}")).unwrap();

        let mut level = vec![sha256d::Hash::hash(&coinbase_bin)];
        level.extend(
            template
                .transactions
                .iter()
                .map(|tx| tx.txid.to_raw_hash()),
        );

        while level.len() > 1 {
            level = level
                .chunks(2)
                .map(|pair| {
                    let mut concat = Vec::with_capacity(64);
                    concat.extend_from_slice(pair[0].as_byte_array());
                    concat.extend_from_slice(pair.get(1).unwrap_or(&pair[0]).as_byte_array());
                    sha256d::Hash::hash(&concat)
                })
                .collect();
        }

        assert_eq!(folded, level[0], "{transactions} transactions");
    }
}

#[test]
fn coinbase_halves_splice_back_into_a_valid_transaction() {
    let job = Job::new(template(2), JobId::new(1), true).unwrap();
    let extranonce1: Extranonce = "00000001".parse().unwrap();
    let (coinb1, coinb2) = halves(&job, &extranonce1);

    for extranonce2_hex in ["00000000", "deadbeef", "ffffffff"] {
        let joined =
            hex::decode(format!("{coinb1}{extranonce1}{extranonce2_hex}{coinb2}")).unwrap();

        let transaction: Transaction = consensus::encode::deserialize(&joined).unwrap();

        assert_eq!(
            consensus::serialize(&transaction),
            joined,
            "non-witness serialization round-trips"
        );

        let script_sig = transaction.input[0].script_sig.as_bytes();
        let tail = &script_sig[script_sig.len() - 8..];
        assert_eq!(&tail[..4], extranonce1.as_bytes());
        assert_eq!(tail[4..], hex::decode(extranonce2_hex).unwrap());

        assert_eq!(transaction.output.len(), 2);
        assert_eq!(
            transaction.output[0].value,
            Amount::from_sat(312_500_000)
        );
        assert!(
            transaction.output[1]
                .script_pubkey
                .as_bytes()
                .starts_with(&[0x6a, 0x24, 0xaa, 0x21, 0xa9, 0xed])
        );
    }
}

#[test]
fn different_sessions_share_a_job_but_not_a_coinbase() {
    let job = Job::new(template(1), JobId::new(1), true).unwrap();

    let first = halves(&job, &"00000001".parse().unwrap());
    let second = halves(&job, &"00000002".parse().unwrap());

    assert_ne!(first.0, second.0, "extranonce1 lives in coinb1");
    assert_eq!(first.1, second.1, "coinb2 is session independent");
}

#[test]
fn payout_scripts_are_deterministic_and_total() {
    let cases = [
        (
            "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa",
            "76a91462e907b15cbf27d5425399ebf6f0fb50ebb88f1888ac",
        ),
        (
            "3P14159f73E4gFr7JterCCQh9QjiTjiZrG",
            "a914e9c3dd0c07aac76179ebc76a6c78d4d67c6c160a87",
        ),
        (
            "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4",
            "0014751e76e8199196d454941c45d1b3a323f1433bd6",
        ),
        ("definitely-not-an-address", "6a"),
    ];

    for (address, script) in cases {
        assert_eq!(hex::encode(script_pubkey(address).as_bytes()), script);
        assert_eq!(script_pubkey(address), script_pubkey(address));
    }
}

#[test]
fn ledger_snapshot_reflects_the_session_lifecycle() {
    let ledger = Ledger::new();

    ledger.register_session(1, "bc1qexample", "rig1", 1_000);
    ledger.record_share("bc1qexample", "rig1", 96.0, true, 2_000);
    ledger.session_share_accepted(1, 96.0, 2_000);
    ledger.update_best_difficulty("bc1qexample", 96.0);

    let sessions = ledger.snapshot_sessions();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].address, "bc1qexample");
    assert_eq!(sessions[0].worker, "rig1");
    assert_eq!(sessions[0].shares_accepted, 1);
    assert_eq!(sessions[0].best_difficulty, 96.0);
    assert_eq!(sessions[0].connected_at, 1_000);
    assert_eq!(sessions[0].last_share, Some(2_000));

    ledger.record_block_found("bc1qexample", "rig1", 890_123);
    assert_eq!(ledger.blocks_found().len(), 1);

    ledger.remove_session(1);
    assert!(ledger.snapshot_sessions().is_empty());
    assert_eq!(ledger.best_difficulty("bc1qexample"), 96.0);
}
