use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use super::DecodeError;

/// Base58Check version byte for pay-to-script-hash identities.
const P2SH_VERSION: u8 = 0x05;

/// Slice `text` by byte offsets the way protocol offsets are published:
/// negative offsets count from the end, out-of-range offsets clamp, and an
/// empty or inverted range yields "".
pub fn window(text: &str, start: isize, end: Option<isize>) -> &str {
    let len = text.len() as isize;
    let resolve = |i: isize| -> usize {
        let i = if i < 0 { len + i } else { i };
        i.clamp(0, len) as usize
    };

    let from = resolve(start);
    let to = end.map(resolve).unwrap_or(text.len());
    if from >= to {
        return "";
    }
    text.get(from..to).unwrap_or("")
}

/// Truncate to at most `max` characters.
pub fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

/// SHA-256 of the script bytes, byte-reversed and hex encoded.
pub fn script_hash(script_hex: &str) -> Result<String, DecodeError> {
    let bytes = hex::decode(script_hex).map_err(|_| DecodeError::InvalidHex("script"))?;
    let mut digest = Sha256::digest(&bytes).to_vec();
    digest.reverse();
    Ok(hex::encode(digest))
}

/// Address identity for a bare `m <pubkey>... n OP_CHECKMULTISIG` output.
pub fn multisig_address(asm: &str, script_hex: &str) -> Result<String, DecodeError> {
    let tokens: Vec<&str> = asm.split_whitespace().collect();
    if tokens.len() < 4 || tokens.last() != Some(&"OP_CHECKMULTISIG") {
        return Err(DecodeError::MalformedMultisig);
    }

    let required = small_int(tokens[0]).ok_or(DecodeError::MalformedMultisig)?;
    let total = small_int(tokens[tokens.len() - 2]).ok_or(DecodeError::MalformedMultisig)?;
    let keys = &tokens[1..tokens.len() - 2];

    if required == 0 || required > total || total > 16 || keys.len() != total as usize {
        return Err(DecodeError::MalformedMultisig);
    }
    if keys.iter().any(|key| hex::decode(key).is_err()) {
        return Err(DecodeError::MalformedMultisig);
    }

    let script = hex::decode(script_hex).map_err(|_| DecodeError::InvalidHex("multisig script"))?;
    let hash = Ripemd160::digest(Sha256::digest(&script));
    Ok(bs58::encode(hash)
        .with_check_version(P2SH_VERSION)
        .into_string())
}

// The node prints small pushes either as "3" or "OP_3".
fn small_int(token: &str) -> Option<u8> {
    token.strip_prefix("OP_").unwrap_or(token).parse().ok()
}
