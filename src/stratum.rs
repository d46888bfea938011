use super::*;

mod authorize;
mod configure;
mod difficulty;
mod error;
mod extranonce;
mod job_id;
mod merkle;
mod message;
mod nbits;
mod nonce;
mod notify;
mod ntime;
mod prevhash;
mod set_difficulty;
mod submit;
mod subscribe;
mod username;
mod version;

pub use {
    authorize::Authorize,
    configure::Configure,
    difficulty::{DIFFICULTY_1_TARGET, Difficulty, network_difficulty, share_difficulty},
    error::{InternalError, JsonRpcError, StratumError},
    extranonce::Extranonce,
    job_id::JobId,
    merkle::{
        MerkleNode, WITNESS_RESERVED_VALUE, merkle_branches, merkle_root, witness_commitment,
    },
    message::{Id, Message},
    nbits::Nbits,
    nonce::Nonce,
    notify::Notify,
    ntime::Ntime,
    prevhash::PrevHash,
    set_difficulty::SetDifficulty,
    submit::Submit,
    subscribe::{Subscribe, SubscribeResult},
    username::Username,
    version::Version,
};
