use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Heuristic records: one fixed shape per detector slot in `metadata.strategy`
// ---------------------------------------------------------------------------

/// Slots written by the heuristic detectors. Each detector owns exactly one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyFlags {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large_spend: Option<LargeSpend>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_address_type: Option<SameAddressType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coinjoin_detection: Option<CoinjoinDetection>,
}

impl StrategyFlags {
    pub fn is_empty(&self) -> bool {
        self.large_spend.is_none()
            && self.same_address_type.is_none()
            && self.coinjoin_detection.is_none()
    }
}

/// A single output that received (almost) everything a transaction spent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LargeSpend {
    pub fraction: f64,
    pub percentage: f64,
    pub spent: u64,
    pub total: u64,
    pub transaction: String,
    /// Input addresses of the transaction.
    pub addresses: Vec<String>,
    /// Identities owning any of those inputs.
    pub identities: Vec<String>,
}

/// An address sharing its format (leading character) with the lone address
/// on the other side of a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SameAddressType {
    pub transaction: String,
    pub address: String,
    pub identity: Option<String>,
}

/// Fan-out large enough to suggest a coinjoin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinjoinDetection {
    pub inputs: usize,
    pub outputs: usize,
    pub coinjoin_probable: bool,
}
