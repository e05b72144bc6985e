// Rules are checked in order and the first match wins.

use super::script::window;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NftVariant {
    /// Code, holder and tape outputs.
    Standard,
    /// Code and holder outputs; the tape reference lives in the holder output.
    Pool,
    /// Carries the NFT marker but matches no known layout.
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    Normal,
    Ft,
    Nft(NftVariant),
    NftCollection,
    Multisig,
}

impl ScriptKind {
    /// Number of consecutive outputs a non-collection group occupies.
    /// Collections reserve `supply` slots and are sized by the engine.
    pub fn group_width(self) -> usize {
        match self {
            ScriptKind::Ft => 2,
            ScriptKind::Nft(NftVariant::Standard) => 3,
            ScriptKind::Nft(NftVariant::Pool) => 2,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Pattern {
    Prefix(&'static str),
    Suffix(&'static str),
}

impl Pattern {
    fn matches(self, asm: &str) -> bool {
        match self {
            Pattern::Prefix(p) => asm.starts_with(p),
            Pattern::Suffix(s) => asm.ends_with(s),
        }
    }
}

pub const FT_CODE_PREFIX: &str = "9 OP_PICK OP_TOALTSTACK";
pub const NFT_CODE_PREFIX: &str = "1 OP_PICK 3 OP_SPLIT";

/// Unlock scripts of FT inputs start with this push.
pub const FT_SPEND_MARKER: &str = "1 ";

const POOL_FT_SUFFIX: &str = "01 32436f6465";
const LEGACY_FT_TAIL: &str = "OP_CHECKSIG OP_RETURN";

const RULES: &[(Pattern, ScriptKind)] = &[
    (Pattern::Prefix("0 OP_RETURN"), ScriptKind::NftCollection),
    (Pattern::Prefix("OP_RETURN"), ScriptKind::NftCollection),
    (
        Pattern::Prefix("1 OP_PICK 3 OP_SPLIT 20"),
        ScriptKind::Nft(NftVariant::Standard),
    ),
    (
        Pattern::Prefix("1 OP_PICK 3 OP_SPLIT OP_NIP"),
        ScriptKind::Nft(NftVariant::Pool),
    ),
    (
        Pattern::Prefix("4 OP_PICK OP_BIN2NUM OP_TOALTSTACK 1 OP_PICK 3 OP_SPLIT"),
        ScriptKind::Nft(NftVariant::Pool),
    ),
    (
        Pattern::Prefix(NFT_CODE_PREFIX),
        ScriptKind::Nft(NftVariant::Unsupported),
    ),
    (Pattern::Prefix(FT_CODE_PREFIX), ScriptKind::Ft),
    (Pattern::Suffix("OP_CHECKMULTISIG"), ScriptKind::Multisig),
];

/// Classify an output by its disassembled script.
pub fn classify(asm: &str) -> ScriptKind {
    RULES
        .iter()
        .find(|(pattern, _)| pattern.matches(asm))
        .map(|(_, kind)| *kind)
        .unwrap_or(ScriptKind::Normal)
}

/// FT code outputs produced by the first protocol release. Not indexed.
pub fn is_legacy_ft(asm: &str) -> bool {
    window(asm, -32, Some(-11)) == LEGACY_FT_TAIL
}

/// Synthetic participant id for an FT pool-contract output, if `asm` is one.
pub fn pool_participant(asm: &str) -> Option<String> {
    if asm.starts_with(FT_CODE_PREFIX) && asm.ends_with(POOL_FT_SUFFIX) {
        Some(format!("Pool_{}", window(asm, -53, Some(-11))))
    } else {
        None
    }
}
