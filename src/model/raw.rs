use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Raw transaction records as delivered by the fetch collaborator
// ---------------------------------------------------------------------------

/// Satoshis per bitcoin.
pub const SATOSHIS_PER_BTC: f64 = 1e8;

/// One transaction, in the Insight API shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    pub txid: String,
    #[serde(default)]
    pub vin: Vec<RawInput>,
    #[serde(default)]
    pub vout: Vec<RawOutput>,
    #[serde(default)]
    pub blockhash: String,
    /// Milliseconds since the UNIX epoch.
    #[serde(default)]
    pub time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawInput {
    /// Absent on coinbase inputs.
    #[serde(default)]
    pub addr: Option<String>,
    #[serde(default)]
    pub value_sat: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOutput {
    /// Amount in bitcoin.
    pub value: f64,
    pub script_pub_key: ScriptPubKey,
}

impl RawOutput {
    /// Only the first listed address is used, even for multi-address outputs.
    pub fn primary_address(&self) -> Option<&str> {
        self.script_pub_key.addresses.first().map(String::as_str)
    }

    pub fn satoshis(&self) -> u64 {
        (self.value * SATOSHIS_PER_BTC).round().max(0.0) as u64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptPubKey {
    #[serde(default)]
    pub addresses: Vec<String>,
}

/// Envelope returned by an Insight `txs?address=` query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTransactionPage {
    #[serde(default)]
    pub txs: Vec<RawTransaction>,
}
