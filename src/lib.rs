use {
    address::script_pubkey,
    anyhow::{Context, Error, bail, ensure},
    bitcoin::{
        Amount, Block, BlockHash, CompactTarget, OutPoint, ScriptBuf, Sequence, Target,
        Transaction, TxIn, TxOut, Txid, VarInt, Witness, Wtxid,
        block::{self, Header},
        consensus::{self, Decodable},
        hashes::{Hash, sha256d},
        locktime::absolute::LockTime,
    },
    bitcoincore_rpc::{Auth, RpcApi},
    block_template::{BlockTemplate, TemplateTransaction},
    byteorder::{BigEndian, ByteOrder, LittleEndian},
    chain::Chain,
    clap::Parser,
    coinbase::CoinbaseBuilder,
    connection::Connection,
    extranonces::ExtranonceCounter,
    futures::{sink::SinkExt, stream::StreamExt},
    generator::Generator,
    hash_rate::HashRate,
    job::Job,
    jobs::Jobs,
    ledger::Ledger,
    options::Options,
    primitive_types::U256,
    serde::{
        Deserialize, Serialize,
        de::{self, Deserializer},
        ser::{SerializeMap, SerializeSeq, Serializer},
    },
    serde_json::{Value, json},
    serde_with::{DeserializeFromStr, SerializeDisplay},
    std::{
        collections::HashMap,
        env,
        fmt::{self, Display, Formatter},
        io,
        net::SocketAddr,
        process,
        str::FromStr,
        sync::{
            Arc, LazyLock, Mutex,
            atomic::{AtomicU32, Ordering},
        },
        time::{Duration, SystemTime, UNIX_EPOCH},
    },
    stratum::{
        Authorize, Configure, Difficulty, Extranonce, Id, JobId, MerkleNode, Message, Nbits, Nonce,
        Notify, Ntime, PrevHash, SetDifficulty, StratumError, Submit, Subscribe, SubscribeResult,
        Username, Version,
    },
    submitter::FoundBlock,
    tokio::{
        io::{AsyncRead, AsyncWrite},
        net::TcpListener,
        runtime::Runtime,
        sync::{mpsc, watch},
        task::{self, JoinHandle},
        time::{MissedTickBehavior, interval},
    },
    tokio_util::{
        codec::{FramedRead, FramedWrite, LinesCodec},
        sync::CancellationToken,
    },
    tracing::{debug, error, info, warn},
    tracing_appender::non_blocking,
    tracing_subscriber::EnvFilter,
};

pub mod address;
pub mod block_template;
mod chain;
pub mod coinbase;
mod connection;
mod extranonces;
mod generator;
pub mod hash_rate;
pub mod job;
mod jobs;
pub mod ledger;
mod options;
mod server;
mod signal;
pub mod stratum;
mod submitter;

pub const COIN_VALUE: u64 = 100_000_000;

pub const EXTRANONCE1_SIZE: usize = 4;
pub const EXTRANONCE2_SIZE: usize = 4;
pub const MAX_MESSAGE_SIZE: usize = 32 * 1024;

/// BIP 310 rolling mask offered to every client that asks for version rolling.
pub static VERSION_MASK: LazyLock<Version> = LazyLock::new(|| Version::from(0x1fffe000));

type Result<T = (), E = Error> = std::result::Result<T, E>;

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

pub fn main() {
    let (writer, _guard) = non_blocking(io::stderr());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(writer)
        .init();

    let options = Options::parse();

    Runtime::new()
        .expect("Failed to create tokio runtime")
        .block_on(async {
            let cancel_token = signal::setup_signal_handler();

            match server::run(options, cancel_token).await {
                Err(err) => {
                    error!("error: {err}");

                    if env::var_os("RUST_BACKTRACE")
                        .map(|val| val == "1")
                        .unwrap_or_default()
                    {
                        error!("{}", err.backtrace());
                    }
                    process::exit(1);
                }
                Ok(_) => {
                    process::exit(0);
                }
            }
        });
}
