use serde::{Deserialize, Serialize};

/// Coin amounts reported by the node are decimals; the ledger stores minor units.
pub const SCALING_FACTOR: i64 = 1_000_000;

/// Convert a node-reported coin value into ledger minor units.
pub fn to_minor_units(value: f64) -> i64 {
    (value * SCALING_FACTOR as f64).round() as i64
}

/// Result of `getblockbyheight <h> 1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockSummary {
    #[serde(default)]
    pub tx: Vec<String>,
    pub time: i64,
}

/// Result of `getrawtransaction <txid> 1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTransaction {
    pub txid: String,
    #[serde(default)]
    pub vin: Vec<TxInput>,
    #[serde(default)]
    pub vout: Vec<TxOutput>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TxInput {
    /// Absent on coinbase inputs.
    #[serde(default)]
    pub txid: Option<String>,
    #[serde(default)]
    pub vout: Option<u32>,
    #[serde(rename = "scriptSig", default)]
    pub script_sig: Option<ScriptSig>,
    #[serde(default)]
    pub coinbase: Option<String>,
}

impl TxInput {
    pub fn is_coinbase(&self) -> bool {
        self.coinbase.is_some()
    }

    /// The outpoint this input spends, if it spends one.
    pub fn outpoint(&self) -> Option<(&str, u32)> {
        match (&self.txid, self.vout) {
            (Some(txid), Some(vout)) => Some((txid.as_str(), vout)),
            _ => None,
        }
    }

    pub fn unlock_asm(&self) -> &str {
        self.script_sig.as_ref().map(|s| s.asm.as_str()).unwrap_or("")
    }

    pub fn unlock_hex(&self) -> &str {
        self.script_sig.as_ref().map(|s| s.hex.as_str()).unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptSig {
    #[serde(default)]
    pub asm: String,
    #[serde(default)]
    pub hex: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TxOutput {
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub n: u32,
    #[serde(rename = "scriptPubKey", default)]
    pub script_pub_key: ScriptPubKey,
}

impl TxOutput {
    pub fn asm(&self) -> &str {
        &self.script_pub_key.asm
    }

    pub fn hex(&self) -> &str {
        &self.script_pub_key.hex
    }

    pub fn minor_value(&self) -> i64 {
        to_minor_units(self.value)
    }

    pub fn is_pay_to_address(&self) -> bool {
        self.script_pub_key.script_type == "pubkeyhash"
    }

    pub fn first_address(&self) -> Option<&str> {
        self.script_pub_key.addresses.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptPubKey {
    #[serde(default)]
    pub asm: String,
    #[serde(default)]
    pub hex: String,
    #[serde(rename = "type", default)]
    pub script_type: String,
    #[serde(default)]
    pub addresses: Vec<String>,
}

/// How an input's originating output was resolved for history aggregation.
#[derive(Debug, Clone)]
pub enum Prevout {
    Coinbase,
    Resolved(TxOutput),
    Missing,
}

/// A decoded transaction together with everything the apply phase needs from the node.
#[derive(Debug, Clone)]
pub struct FetchedTransaction {
    pub tx: std::sync::Arc<RawTransaction>,
    /// One entry per input, in input order. Empty when history is disabled.
    pub prevouts: Vec<Prevout>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minor_units_round_half_away() {
        assert_eq!(to_minor_units(0.000001), 1);
        assert_eq!(to_minor_units(1.5), 1_500_000);
        assert_eq!(to_minor_units(0.0000005), 1);
    }

    #[test]
    fn decodes_verbose_transaction() {
        let raw = r#"{
            "txid": "aa",
            "vin": [
                {"coinbase": "03ab", "sequence": 1},
                {"txid": "bb", "vout": 2, "scriptSig": {"asm": "1 00", "hex": "5100"}}
            ],
            "vout": [
                {"value": 0.5, "n": 0, "scriptPubKey": {"asm": "OP_DUP", "hex": "76", "type": "pubkeyhash", "addresses": ["1abc"]}}
            ]
        }"#;
        let tx: RawTransaction = serde_json::from_str(raw).unwrap();
        assert!(tx.vin[0].is_coinbase());
        assert!(!tx.vin[1].is_coinbase());
        assert_eq!(tx.vin[1].outpoint(), Some(("bb", 2)));
        assert_eq!(tx.vin[1].unlock_asm(), "1 00");
        assert_eq!(tx.vout[0].first_address(), Some("1abc"));
        assert!(tx.vout[0].is_pay_to_address());
        assert_eq!(tx.vout[0].minor_value(), 500_000);
    }
}
