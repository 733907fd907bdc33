//! Raw transaction events and the canonical message sent to agents.

use serde::{Deserialize, Serialize};

// ─── Raw (producer-owned) event ──────────────────────────────────────────────

/// A transaction event as observed by the upstream feed.
///
/// Fields mirror the JSON-RPC shapes returned by EVM nodes (hex quantities,
/// mixed-case addresses). Everything is optional; validation happens in
/// [`crate::translate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionEvent {
    /// Chain id as a hex (`0x1`) or decimal (`1`) string.
    #[serde(default)]
    pub chain_id: Option<String>,
    #[serde(default)]
    pub block: Option<RawBlock>,
    #[serde(default)]
    pub transaction: Option<RawTransaction>,
    /// Absent for pending transactions.
    #[serde(default)]
    pub receipt: Option<RawReceipt>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBlock {
    pub number: Option<String>,
    pub hash: Option<String>,
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    pub hash: Option<String>,
    pub from: Option<String>,
    /// `None` for contract creation.
    #[serde(default)]
    pub to: Option<String>,
    pub nonce: Option<String>,
    pub gas: Option<String>,
    pub gas_price: Option<String>,
    pub value: Option<String>,
    #[serde(default)]
    pub input: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReceipt {
    pub status: Option<String>,
    pub gas_used: Option<String>,
    #[serde(default)]
    pub contract_address: Option<String>,
    #[serde(default)]
    pub logs: Vec<RawLog>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    pub address: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub data: Option<String>,
    pub log_index: Option<String>,
}

// ─── Canonical message ───────────────────────────────────────────────────────

/// The canonical payload of an Evaluate request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionMessage {
    pub chain_id: u64,
    pub block: BlockInfo,
    pub transaction: TransactionInfo,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub receipt: Option<ReceiptInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub number: u64,
    pub hash: String,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInfo {
    pub hash: String,
    pub from: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub to: Option<String>,
    pub nonce: u64,
    pub gas: u64,
    /// 256-bit quantity, normalized `0x` hex.
    pub gas_price: String,
    /// 256-bit quantity, normalized `0x` hex.
    pub value: String,
    /// Calldata, lower-case `0x` hex (`0x` when empty).
    pub input: String,
}

impl TransactionInfo {
    /// Returns `true` if this transaction deploys a contract.
    pub fn is_contract_creation(&self) -> bool {
        self.to.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptInfo {
    /// `true` if execution succeeded (`status == 0x1`).
    pub success: bool,
    pub gas_used: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub contract_address: Option<String>,
    pub logs: Vec<LogInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogInfo {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    pub log_index: u64,
}
