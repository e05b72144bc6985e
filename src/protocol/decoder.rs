// Field extraction for classified protocol outputs.
// Offsets are byte offsets into the node's `asm`/`hex` renderings. Every
// protocol revision that moved a field is kept as a rule so older outputs stay
// decodable.

use serde_json::{Map, Value};

use super::script::{script_hash, truncate_chars, window};
use super::{DecodeError, NftVariant};
use crate::blockchain::models::{RawTransaction, TxOutput};
use crate::models::{budget, LP_SENTINEL};

/// Token amount segments inside the FT tape disassembly.
const AMOUNT_WINDOW: (isize, isize) = (12, 108);
const AMOUNT_SEGMENT_HEX: usize = 16;

/// Holder script inside the FT code hex.
const HOLDER_SCRIPT_WINDOW: (isize, isize) = (-54, -12);

/// Packed name/symbol fields inside the FT tape hex.
const FT_INFO_WINDOW: (isize, isize) = (106, -12);

/// Where the origin reference sits in the first protocol revision.
const ORIGIN_WINDOW: (isize, isize) = (2384, 2456);

#[derive(Debug, Clone, Copy)]
enum OriginSource {
    Window(isize, isize),
    Literal(&'static str),
}

/// When the current candidate equals `marker`, the origin is read from `source` instead.
struct OriginRevision {
    marker: &'static str,
    source: OriginSource,
}

const ORIGIN_REVISIONS: &[OriginRevision] = &[
    // Second release shifted the code script by 93 bytes.
    OriginRevision {
        marker: "P OP_EQUAL OP_IF OP_FROMALTSTACK OP_DROP OP_TOALTSTACK OP_TOALTSTACK OP_",
        source: OriginSource::Window(2477, 2549),
    },
    // Liquidity-pool outputs carry no origin of their own.
    OriginRevision {
        marker: "UALVERIFY OP_ENDIF OP_DUP 2 OP_EQUAL OP_IF OP_DROP 2 OP_PICK 2 OP_PICK O",
        source: OriginSource::Literal(LP_SENTINEL),
    },
];

struct TapeFraming {
    marker: &'static str,
    head: isize,
    tail: isize,
}

const TAPE_FRAMINGS: &[TapeFraming] = &[
    TapeFraming { marker: "0 OP_RETURN", head: 12, tail: -11 },
    TapeFraming { marker: "OP_RETURN", head: 10, tail: -10 },
];

/// An FT code output plus the amount carried by its tape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtOutput {
    pub holder_script: String,
    pub amount: u64,
    pub origin: String,
    pub utxo_balance: i64,
}

/// Mint-time metadata packed into the FT tape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionTape {
    pub name: String,
    pub symbol: String,
    pub attributes: String,
    pub description: String,
    pub supply: i64,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionOutput {
    pub tape: CollectionTape,
    pub creator_address: String,
    pub creator_script_hash: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NftTape {
    pub name: String,
    pub symbol: String,
    pub attributes: String,
    pub description: String,
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NftOutput {
    pub variant: NftVariant,
    pub tape: NftTape,
    pub code_balance: i64,
    pub holder_balance: i64,
    pub holder_address: String,
    pub holder_script_hash: String,
}

/// Sum of the little-endian 8-byte segments in `segments`.
pub fn decode_le_amount(segments: &str) -> Result<u64, DecodeError> {
    let mut total: u64 = 0;

    for chunk in segments.as_bytes().chunks(AMOUNT_SEGMENT_HEX) {
        if chunk.len() % 2 != 0 || !chunk.iter().all(u8::is_ascii_hexdigit) {
            return Err(DecodeError::InvalidAmount(
                String::from_utf8_lossy(chunk).into_owned(),
            ));
        }

        // Reverse byte pairs to get the big-endian rendering.
        let big_endian: String = chunk
            .chunks(2)
            .rev()
            .flat_map(|pair| pair.iter().map(|b| *b as char))
            .collect();
        let value = u64::from_str_radix(&big_endian, 16)
            .map_err(|_| DecodeError::InvalidAmount(big_endian.clone()))?;

        total = total.checked_add(value).ok_or(DecodeError::AmountOverflow)?;
    }

    Ok(total)
}

/// Origin reference of an FT code output, following every protocol revision in order.
pub fn resolve_origin(code_asm: &str) -> String {
    let mut origin = window(code_asm, ORIGIN_WINDOW.0, Some(ORIGIN_WINDOW.1));
    for revision in ORIGIN_REVISIONS {
        if origin == revision.marker {
            origin = match revision.source {
                OriginSource::Window(start, end) => window(code_asm, start, Some(end)),
                OriginSource::Literal(value) => value,
            };
        }
    }
    truncate_chars(origin, budget::FT_ORIGIN)
}

/// Hex payload of an OP_RETURN tape with its framing stripped.
pub fn tape_payload(asm: &str) -> Option<&str> {
    TAPE_FRAMINGS
        .iter()
        .find(|framing| asm.starts_with(framing.marker))
        .map(|framing| window(asm, framing.head, Some(framing.tail)))
}

pub fn decode_ft_output(tx: &RawTransaction, index: usize) -> Result<FtOutput, DecodeError> {
    let code = output(tx, index, index)?;
    let tape = output(tx, index, index + 1)?;

    if super::classifier::is_legacy_ft(code.asm()) {
        return Err(DecodeError::LegacyEncoding);
    }

    let holder_script = window(code.hex(), HOLDER_SCRIPT_WINDOW.0, Some(HOLDER_SCRIPT_WINDOW.1));
    let amount = decode_le_amount(window(tape.asm(), AMOUNT_WINDOW.0, Some(AMOUNT_WINDOW.1)))?;

    Ok(FtOutput {
        holder_script: truncate_chars(holder_script, budget::FT_HOLDER_SCRIPT),
        amount,
        origin: resolve_origin(code.asm()),
        utxo_balance: code.minor_value(),
    })
}

pub fn decode_ft_metadata(tape: &TxOutput) -> Result<FtMetadata, DecodeError> {
    let decimals_token = tape.asm().split(' ').nth(3).unwrap_or_default();
    let decimals = decimals_token
        .parse::<i64>()
        .map_err(|_| DecodeError::InvalidField {
            field: "decimal",
            value: decimals_token.to_string(),
        })?;

    let mut packed = PackedFields {
        hex: window(tape.hex(), FT_INFO_WINDOW.0, Some(FT_INFO_WINDOW.1)),
        pos: 0,
    };
    let name = packed.length_prefixed_text("token name")?;
    let symbol = packed.length_prefixed_text("token symbol")?;

    Ok(FtMetadata {
        name: truncate_chars(&name, budget::FT_NAME),
        symbol: truncate_chars(&symbol, budget::FT_SYMBOL),
        decimals,
    })
}

pub fn decode_collection(tx: &RawTransaction, index: usize) -> Result<CollectionOutput, DecodeError> {
    let code = output(tx, index, index)?;
    let creator = output(tx, index, index + 1)?;

    if !creator.is_pay_to_address() {
        return Err(DecodeError::UnexpectedCompanion {
            index: index + 1,
            reason: "creator output is not pay-to-address",
        });
    }
    let creator_address = creator.first_address().ok_or(DecodeError::UnexpectedCompanion {
        index: index + 1,
        reason: "creator output has no address",
    })?;

    let payload = tape_payload(code.asm()).ok_or(DecodeError::UnexpectedCompanion {
        index,
        reason: "missing tape framing",
    })?;
    let json = decode_json_tape(payload, "collection tape")?;

    let supply = json.get("supply").and_then(Value::as_i64).unwrap_or(0);
    if supply <= 0 {
        return Err(DecodeError::InvalidSupply(supply));
    }

    Ok(CollectionOutput {
        tape: CollectionTape {
            name: truncate_chars(&text_field(&json, "collectionName"), budget::COLLECTION_NAME),
            symbol: truncate_chars(&text_field(&json, "symbol"), budget::COLLECTION_SYMBOL),
            attributes: text_field(&json, "attributes"),
            description: text_field(&json, "description"),
            supply,
            icon: text_field(&json, "file"),
        },
        creator_address: truncate_chars(creator_address, budget::COLLECTION_CREATOR),
        creator_script_hash: script_hash(code.hex())?,
    })
}

pub fn decode_nft(tx: &RawTransaction, index: usize, variant: NftVariant) -> Result<NftOutput, DecodeError> {
    let code = output(tx, index, index)?;

    let tape = match variant {
        NftVariant::Standard => {
            let tape_output = output(tx, index, index + 2)?;
            let payload = tape_payload(tape_output.asm()).ok_or(DecodeError::UnexpectedCompanion {
                index: index + 2,
                reason: "missing tape framing",
            })?;
            let json = decode_json_tape(payload, "nft tape")?;
            NftTape {
                name: truncate_chars(&text_field(&json, "nftName"), budget::NFT_NAME),
                symbol: truncate_chars(&text_field(&json, "symbol"), budget::NFT_SYMBOL),
                attributes: text_field(&json, "attributes"),
                description: text_field(&json, "description"),
                file: text_field(&json, "file"),
            }
        }
        NftVariant::Pool => {
            let holder = output(tx, index, index + 1)?;
            let file = holder.asm().split(' ').nth(4).ok_or(DecodeError::UnexpectedCompanion {
                index: index + 1,
                reason: "missing pool tape reference",
            })?;
            NftTape {
                file: file.to_string(),
                ..NftTape::default()
            }
        }
        NftVariant::Unsupported => return Err(DecodeError::UnsupportedNftVariant),
    };

    let holder = output(tx, index, index + 1)?;
    let holder_address = holder.first_address().unwrap_or(LP_SENTINEL);

    Ok(NftOutput {
        variant,
        tape,
        code_balance: code.minor_value(),
        holder_balance: holder.minor_value(),
        holder_address: truncate_chars(holder_address, budget::NFT_HOLDER_ADDRESS),
        holder_script_hash: truncate_chars(&script_hash(holder.hex())?, budget::NFT_HOLDER_SCRIPT_HASH),
    })
}

fn output(tx: &RawTransaction, index: usize, companion: usize) -> Result<&TxOutput, DecodeError> {
    tx.vout
        .get(companion)
        .ok_or(DecodeError::MissingCompanion { index, companion })
}

fn decode_json_tape(payload_hex: &str, field: &'static str) -> Result<Map<String, Value>, DecodeError> {
    let bytes = hex::decode(payload_hex).map_err(|_| DecodeError::InvalidHex(field))?;
    let text = String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8(field))?;

    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(DecodeError::InvalidJson(format!("{field} is not an object"))),
        Err(e) => Err(DecodeError::InvalidJson(e.to_string())),
    }
}

/// Strings are stored as-is; other JSON values as their JSON text.
fn text_field(json: &Map<String, Value>, key: &str) -> String {
    match json.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

struct PackedFields<'a> {
    hex: &'a str,
    pos: usize,
}

impl PackedFields<'_> {
    fn take(&mut self, len: usize, field: &'static str) -> Result<Vec<u8>, DecodeError> {
        let end = self.pos + len * 2;
        let slice = self.hex.get(self.pos..end).ok_or(DecodeError::InvalidHex(field))?;
        self.pos = end;
        hex::decode(slice).map_err(|_| DecodeError::InvalidHex(field))
    }

    fn length_prefixed_text(&mut self, field: &'static str) -> Result<String, DecodeError> {
        let header = self.take(1, field)?;
        let len = header.first().copied().unwrap_or_default() as usize;
        let bytes = self.take(len, field)?;
        String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8(field))
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    /// Seeded linear congruential generator for deterministic pseudo-random inputs.
    struct Lcg {
        state: u64,
    }

    impl Lcg {
        fn new(seed: u64) -> Self {
            Self { state: seed }
        }

        fn next_u64(&mut self) -> u64 {
            self.state = self
                .state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            self.state
        }
    }

    fn tx(vout: Vec<TxOutput>) -> RawTransaction {
        RawTransaction {
            txid: "11".repeat(32),
            vin: Vec::new(),
            vout,
        }
    }

    #[test]
    fn le_amount_round_trips_over_random_segments() {
        let mut rng = Lcg::new(0x7bc2_0f7a_11d5_3e01);
        for _ in 0..500 {
            let segments = 1 + (rng.next_u64() % 3) as usize;
            // Keep each segment under 2^62 so the sum of three cannot overflow.
            let values: Vec<u64> = (0..segments).map(|_| rng.next_u64() >> 2).collect();
            let expected: u64 = values.iter().sum();
            assert_eq!(decode_le_amount(&le_segments(&values)).unwrap(), expected);
        }
    }

    #[test]
    fn le_amount_single_segment_is_exact() {
        assert_eq!(decode_le_amount("e803000000000000").unwrap(), 1000);
        assert_eq!(decode_le_amount(&le_segments(&[u64::MAX])).unwrap(), u64::MAX);
        assert_eq!(decode_le_amount("").unwrap(), 0);
    }

    #[test]
    fn le_amount_rejects_garbage_and_overflow() {
        assert!(matches!(decode_le_amount("zz00000000000000"), Err(DecodeError::InvalidAmount(_))));
        assert!(matches!(decode_le_amount("e80"), Err(DecodeError::InvalidAmount(_))));
        assert_eq!(
            decode_le_amount(&le_segments(&[u64::MAX, 1])),
            Err(DecodeError::AmountOverflow)
        );
    }

    #[test]
    fn origin_follows_protocol_revisions() {
        let plain = "f".repeat(72);
        assert_eq!(resolve_origin(&ft_code(&plain, &"ab".repeat(21)).script_pub_key.asm), plain);

        let lp = "UALVERIFY OP_ENDIF OP_DUP 2 OP_EQUAL OP_IF OP_DROP 2 OP_PICK 2 OP_PICK O";
        assert_eq!(resolve_origin(&ft_code(lp, &"ab".repeat(21)).script_pub_key.asm), "LP");

        // Second release: marker in the first window, real origin 93 bytes later.
        let marker = "P OP_EQUAL OP_IF OP_FROMALTSTACK OP_DROP OP_TOALTSTACK OP_TOALTSTACK OP_";
        let shifted_origin = "e".repeat(72);
        let mut asm = ft_code(marker, &"ab".repeat(21)).script_pub_key.asm;
        asm.truncate(2456);
        while asm.len() < 2477 {
            asm.push('b');
        }
        asm.push_str(&shifted_origin);
        asm.push_str(" OP_1");
        assert_eq!(resolve_origin(&asm), shifted_origin);

        // Too short for any window.
        assert_eq!(resolve_origin("9 OP_PICK OP_TOALTSTACK"), "");
    }

    #[test]
    fn decodes_ft_output_and_metadata() {
        let holder = "cd".repeat(21);
        let origin = "0".repeat(72);
        let tx = tx(vec![ft_code(&origin, &holder), ft_tape(1000, 6, "Gold", "GLD")]);

        let ft = decode_ft_output(&tx, 0).unwrap();
        assert_eq!(ft.amount, 1000);
        assert_eq!(ft.holder_script, holder);
        assert_eq!(ft.origin, origin);
        assert_eq!(ft.utxo_balance, 500);

        let meta = decode_ft_metadata(&tx.vout[1]).unwrap();
        assert_eq!(meta.name, "Gold");
        assert_eq!(meta.symbol, "GLD");
        assert_eq!(meta.decimals, 6);
    }

    #[test]
    fn ft_output_needs_its_tape() {
        let tx = tx(vec![ft_code(&"0".repeat(72), &"cd".repeat(21))]);
        assert_eq!(
            decode_ft_output(&tx, 0),
            Err(DecodeError::MissingCompanion { index: 0, companion: 1 })
        );
    }

    #[test]
    fn ft_metadata_rejects_bad_utf8() {
        let mut tape = ft_tape(1, 0, "ok", "OK");
        let bad = format!("{}02fffe02414200000000000000", "00".repeat(53));
        tape.script_pub_key.hex = bad;
        assert_eq!(decode_ft_metadata(&tape), Err(DecodeError::InvalidUtf8("token name")));
    }

    #[test]
    fn tape_framing_variants() {
        assert_eq!(tape_payload("0 OP_RETURN 7b7d 4e54617065"), Some("7b7d"));
        assert_eq!(tape_payload("OP_RETURN 7b7d 123456789"), Some("7b7d"));
        assert_eq!(tape_payload("OP_DUP"), None);
    }

    #[test]
    fn decodes_collection() {
        let json = r#"{"collectionName":"Apes","symbol":"APE","attributes":{"k":1},"description":"d","supply":5,"file":"data:image/png;base64,AAAA"}"#;
        let tx = tx(vec![json_tape(json), p2pkh("1Creator", 0.000001)]);

        let collection = decode_collection(&tx, 0).unwrap();
        assert_eq!(collection.tape.name, "Apes");
        assert_eq!(collection.tape.supply, 5);
        assert_eq!(collection.tape.attributes, r#"{"k":1}"#);
        assert_eq!(collection.creator_address, "1Creator");
        assert_eq!(collection.creator_script_hash.len(), 64);
    }

    #[test]
    fn collection_rejects_bad_supply_and_creator() {
        let zero = tx(vec![
            json_tape(r#"{"collectionName":"A","supply":0}"#),
            p2pkh("1Creator", 0.0),
        ]);
        assert_eq!(decode_collection(&zero, 0), Err(DecodeError::InvalidSupply(0)));

        let no_creator = tx(vec![
            json_tape(r#"{"collectionName":"A","supply":1}"#),
            out("OP_TRUE", "51", 0.0),
        ]);
        assert!(matches!(
            decode_collection(&no_creator, 0),
            Err(DecodeError::UnexpectedCompanion { index: 1, .. })
        ));
    }

    #[test]
    fn decodes_standard_and_pool_nft() {
        let code = out("1 OP_PICK 3 OP_SPLIT 20 OP_SPLIT", "51", 0.0002);
        let tape = json_tape(r#"{"nftName":"Ape #1","symbol":"APE","file":"abc"}"#);
        let standard = tx(vec![code.clone(), p2pkh("1Holder", 0.000003), tape]);

        let nft = decode_nft(&standard, 0, NftVariant::Standard).unwrap();
        assert_eq!(nft.tape.name, "Ape #1");
        assert_eq!(nft.tape.file, "abc");
        assert_eq!(nft.code_balance, 200);
        assert_eq!(nft.holder_balance, 3);
        assert_eq!(nft.holder_address, "1Holder");

        let pool_holder = out("OP_DUP OP_HASH160 x OP_EQUALVERIFY poolref OP_DROP", "52", 0.0);
        let pool = tx(vec![code, pool_holder]);
        let nft = decode_nft(&pool, 0, NftVariant::Pool).unwrap();
        assert_eq!(nft.tape.file, "poolref");
        assert_eq!(nft.holder_address, "LP");
    }

    #[test]
    fn nft_decode_failures() {
        let code = out("1 OP_PICK 3 OP_SPLIT 20 OP_SPLIT", "51", 0.0);
        let short = tx(vec![code.clone(), p2pkh("1Holder", 0.0)]);
        assert_eq!(
            decode_nft(&short, 0, NftVariant::Standard),
            Err(DecodeError::MissingCompanion { index: 0, companion: 2 })
        );
        assert_eq!(
            decode_nft(&short, 0, NftVariant::Unsupported),
            Err(DecodeError::UnsupportedNftVariant)
        );

        let bad_json = tx(vec![code, p2pkh("1Holder", 0.0), json_tape("not json")]);
        assert!(matches!(
            decode_nft(&bad_json, 0, NftVariant::Standard),
            Err(DecodeError::InvalidJson(_))
        ));
    }
}
