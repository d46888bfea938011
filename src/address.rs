use super::*;

const BASE58_ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
const BECH32_ALPHABET: &[u8] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// Derives the payout scriptPubKey for a miner-supplied address string.
///
/// Total by design of the protocol: a miner with an unusable address is still
/// served work, but the payout output degrades to a bare `OP_RETURN` and the
/// reward is burned. Checksums are not verified; the miner vouches for their
/// own address.
pub fn script_pubkey(address: &str) -> ScriptBuf {
    match address.chars().next() {
        Some('1') => p2pkh(address),
        Some('3') => p2sh(address),
        _ if address.starts_with("bc1") => segwit(address),
        _ => burn(),
    }
    .unwrap_or_else(burn_script)
}

fn burn() -> Option<ScriptBuf> {
    None
}

fn burn_script() -> ScriptBuf {
    ScriptBuf::from_bytes(vec![0x6a])
}

/// `OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG`
fn p2pkh(address: &str) -> Option<ScriptBuf> {
    let hash160 = base58_hash160(address)?;

    let mut script = Vec::with_capacity(25);
    script.extend_from_slice(&[0x76, 0xa9, 0x14]);
    script.extend_from_slice(&hash160);
    script.extend_from_slice(&[0x88, 0xac]);

    Some(ScriptBuf::from_bytes(script))
}

/// `OP_HASH160 <20> OP_EQUAL`
fn p2sh(address: &str) -> Option<ScriptBuf> {
    let hash160 = base58_hash160(address)?;

    let mut script = Vec::with_capacity(23);
    script.extend_from_slice(&[0xa9, 0x14]);
    script.extend_from_slice(&hash160);
    script.push(0x87);

    Some(ScriptBuf::from_bytes(script))
}

/// `OP_<version> <program>` for the version and program length combinations
/// with a defined output script: v0 + 20, v0 + 32, and v1 + 32 (taproot).
fn segwit(address: &str) -> Option<ScriptBuf> {
    let (version, program) = bech32_decode(address)?;

    let opcode = match (version, program.len()) {
        (0, 20) | (0, 32) => 0x00,
        (1, 32) => 0x51,
        _ => return None,
    };

    let mut script = Vec::with_capacity(2 + program.len());
    script.push(opcode);
    script.push(program.len() as u8);
    script.extend_from_slice(&program);

    Some(ScriptBuf::from_bytes(script))
}

/// Strips the version byte and the (unverified) 4-byte checksum from a
/// 25-byte Base58 payload.
fn base58_hash160(address: &str) -> Option<[u8; 20]> {
    let payload = base58_decode(address)?;

    if payload.len() != 25 {
        return None;
    }

    payload[1..21].try_into().ok()
}

/// Big-integer base conversion; leading `'1'` symbols become leading zero
/// bytes.
fn base58_decode(address: &str) -> Option<Vec<u8>> {
    let mut bytes: Vec<u8> = Vec::new();

    for c in address.bytes() {
        let mut carry = BASE58_ALPHABET.iter().position(|&b| b == c)? as u32;

        for byte in bytes.iter_mut().rev() {
            carry += u32::from(*byte) * 58;
            *byte = (carry & 0xff) as u8;
            carry >>= 8;
        }

        while carry > 0 {
            bytes.insert(0, (carry & 0xff) as u8);
            carry >>= 8;
        }
    }

    let leading_zeros = address.bytes().take_while(|&b| b == b'1').count();
    let mut payload = vec![0u8; leading_zeros];
    payload.extend_from_slice(&bytes);

    Some(payload)
}

/// Splits at the last `'1'`, drops the 6-symbol checksum without verifying
/// it, reads the leading 5-bit value as the witness version, and repacks the
/// remaining 5-bit groups into bytes MSB-first.
fn bech32_decode(address: &str) -> Option<(u8, Vec<u8>)> {
    let (_hrp, data) = address.rsplit_once('1')?;

    let values = data
        .bytes()
        .map(|c| {
            BECH32_ALPHABET
                .iter()
                .position(|&b| b == c)
                .map(|v| v as u8)
        })
        .collect::<Option<Vec<u8>>>()?;

    // version symbol + at least the checksum
    if values.len() < 7 {
        return None;
    }

    let version = values[0];
    let groups = &values[1..values.len() - 6];

    let mut program = Vec::with_capacity(groups.len() * 5 / 8);
    let mut accumulator = 0u32;
    let mut bits = 0u32;

    for &group in groups {
        accumulator = (accumulator << 5) | u32::from(group);
        bits += 5;

        if bits >= 8 {
            bits -= 8;
            program.push((accumulator >> bits) as u8);
            accumulator &= (1 << bits) - 1;
        }
    }

    Some((version, program))
}
