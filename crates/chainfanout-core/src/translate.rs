//! Message translator — raw [`TransactionEvent`] → canonical [`TransactionMessage`].
//!
//! Translation is pure: it never touches the network or shared state, so the
//! dispatcher can drop a failing event and carry on with the next one.

use crate::error::TranslateError;
use crate::event::{
    BlockInfo, LogInfo, RawBlock, RawLog, RawReceipt, RawTransaction, ReceiptInfo,
    TransactionEvent, TransactionInfo, TransactionMessage,
};

/// Conversion from a producer-owned event into the canonical payload.
///
/// Implemented by [`TransactionEvent`]; custom feeds can implement it for
/// their own record types and reuse the dispatcher unchanged.
pub trait ToMessage {
    fn to_message(&self) -> Result<TransactionMessage, TranslateError>;
}

/// Translate one event.
pub fn translate<E: ToMessage + ?Sized>(event: &E) -> Result<TransactionMessage, TranslateError> {
    event.to_message()
}

impl ToMessage for TransactionEvent {
    fn to_message(&self) -> Result<TransactionMessage, TranslateError> {
        let chain_id = chain_id(self.chain_id.as_deref())?;
        let block = block(
            self.block
                .as_ref()
                .ok_or(TranslateError::MissingField { field: "block" })?,
        )?;
        let transaction = transaction(
            self.transaction
                .as_ref()
                .ok_or(TranslateError::MissingField { field: "transaction" })?,
        )?;
        let receipt = self.receipt.as_ref().map(receipt).transpose()?;

        if let (Some(r), Some(_)) = (&receipt, &transaction.to) {
            if r.contract_address.is_some() {
                return Err(TranslateError::Unsupported {
                    reason: "receipt reports a created contract for a call transaction".into(),
                });
            }
        }

        Ok(TransactionMessage {
            chain_id,
            block,
            transaction,
            receipt,
        })
    }
}

fn block(raw: &RawBlock) -> Result<BlockInfo, TranslateError> {
    Ok(BlockInfo {
        number: quantity("block.number", raw.number.as_deref())?,
        hash: hash32("block.hash", raw.hash.as_deref())?,
        timestamp: quantity("block.timestamp", raw.timestamp.as_deref())?,
    })
}

fn transaction(raw: &RawTransaction) -> Result<TransactionInfo, TranslateError> {
    Ok(TransactionInfo {
        hash: hash32("transaction.hash", raw.hash.as_deref())?,
        from: address("transaction.from", raw.from.as_deref())?,
        to: raw
            .to
            .as_deref()
            .map(|to| address("transaction.to", Some(to)))
            .transpose()?,
        nonce: quantity("transaction.nonce", raw.nonce.as_deref())?,
        gas: quantity("transaction.gas", raw.gas.as_deref())?,
        gas_price: u256("transaction.gasPrice", raw.gas_price.as_deref())?,
        value: u256("transaction.value", raw.value.as_deref())?,
        input: data("transaction.input", raw.input.as_deref())?,
    })
}

fn receipt(raw: &RawReceipt) -> Result<ReceiptInfo, TranslateError> {
    let success = match raw.status.as_deref() {
        Some("0x1") => true,
        Some("0x0") => false,
        Some(other) => {
            return Err(TranslateError::InvalidQuantity {
                field: "receipt.status",
                value: other.to_string(),
            })
        }
        None => return Err(TranslateError::MissingField { field: "receipt.status" }),
    };
    Ok(ReceiptInfo {
        success,
        gas_used: quantity("receipt.gasUsed", raw.gas_used.as_deref())?,
        contract_address: raw
            .contract_address
            .as_deref()
            .map(|a| address("receipt.contractAddress", Some(a)))
            .transpose()?,
        logs: raw.logs.iter().map(log).collect::<Result<_, _>>()?,
    })
}

fn log(raw: &RawLog) -> Result<LogInfo, TranslateError> {
    Ok(LogInfo {
        address: address("log.address", raw.address.as_deref())?,
        topics: raw
            .topics
            .iter()
            .map(|t| hash32("log.topics", Some(t)))
            .collect::<Result<_, _>>()?,
        data: data("log.data", raw.data.as_deref())?,
        log_index: quantity("log.logIndex", raw.log_index.as_deref())?,
    })
}

// ─── Field helpers ───────────────────────────────────────────────────────────

fn required<'a>(field: &'static str, value: Option<&'a str>) -> Result<&'a str, TranslateError> {
    value.ok_or(TranslateError::MissingField { field })
}

/// `0x`-prefixed quantity that must fit in a `u64`.
fn quantity(field: &'static str, value: Option<&str>) -> Result<u64, TranslateError> {
    let s = required(field, value)?;
    let invalid = || TranslateError::InvalidQuantity {
        field,
        value: s.to_string(),
    };
    let digits = s.strip_prefix("0x").ok_or_else(invalid)?;
    // from_str_radix alone would accept a leading sign
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    u64::from_str_radix(digits, 16).map_err(|_| invalid())
}

/// Chain ids arrive either as hex quantities or decimal strings.
fn chain_id(value: Option<&str>) -> Result<u64, TranslateError> {
    let s = required("chainId", value)?;
    if s.starts_with("0x") {
        quantity("chainId", Some(s))
    } else {
        let invalid = || TranslateError::InvalidQuantity {
            field: "chainId",
            value: s.to_string(),
        };
        if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        s.parse::<u64>().map_err(|_| invalid())
    }
}

/// 256-bit quantity, normalized to lower-case hex without leading zeros.
fn u256(field: &'static str, value: Option<&str>) -> Result<String, TranslateError> {
    let s = required(field, value)?;
    let invalid = || TranslateError::InvalidQuantity {
        field,
        value: s.to_string(),
    };
    let digits = s.strip_prefix("0x").ok_or_else(invalid)?;
    if digits.is_empty() || digits.len() > 64 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        Ok("0x0".to_string())
    } else {
        Ok(format!("0x{}", trimmed.to_ascii_lowercase()))
    }
}

/// Decode `0x`-prefixed hex of exactly `len` bytes into lower-case form.
fn fixed_bytes(s: &str, len: usize) -> Option<String> {
    let bytes = hex::decode(s.strip_prefix("0x")?).ok()?;
    (bytes.len() == len).then(|| format!("0x{}", hex::encode(bytes)))
}

fn hash32(field: &'static str, value: Option<&str>) -> Result<String, TranslateError> {
    let s = required(field, value)?;
    fixed_bytes(s, 32).ok_or_else(|| TranslateError::InvalidHash {
        field,
        value: s.to_string(),
    })
}

fn address(field: &'static str, value: Option<&str>) -> Result<String, TranslateError> {
    let s = required(field, value)?;
    fixed_bytes(s, 20).ok_or_else(|| TranslateError::InvalidAddress {
        field,
        value: s.to_string(),
    })
}

/// Arbitrary-length byte string; missing or empty means `0x`.
fn data(field: &'static str, value: Option<&str>) -> Result<String, TranslateError> {
    let s = value.unwrap_or("0x");
    let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(s)).map_err(|e| {
        TranslateError::InvalidData {
            field,
            reason: e.to_string(),
        }
    })?;
    Ok(format!("0x{}", hex::encode(bytes)))
}

// ─── Tests ────────────────────────────────────────────────────────────────────
