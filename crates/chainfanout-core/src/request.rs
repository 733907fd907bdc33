//! Evaluate request / response types and the request tagger.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::TransactionMessage;

/// Correlation identifier attached to every outbound request.
///
/// UUIDv7: millisecond timestamp + random bits, so ids are unique without any
/// registry. Used only for log correlation, never for deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An immutable Evaluate request. Each agent queue receives its own clone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateRequest {
    request_id: CorrelationId,
    event: TransactionMessage,
}

impl EvaluateRequest {
    /// Pair a translated message with a freshly generated correlation id.
    pub fn tag(event: TransactionMessage) -> Self {
        Self {
            request_id: CorrelationId::generate(),
            event,
        }
    }

    pub fn request_id(&self) -> &CorrelationId {
        &self.request_id
    }

    pub fn event(&self) -> &TransactionMessage {
        &self.event
    }
}

/// Outcome status reported by an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// Error detail attached to an `Error` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseError {
    pub message: String,
}

/// Severity of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Unknown,
    Info,
    Low,
    Medium,
    High,
    Critical,
}

/// Something an agent flagged about the transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub alert_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub severity: Severity,
    #[serde(default, rename = "type")]
    pub finding_type: String,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// An agent's verdict for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluateResponse {
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ResponseError>,
    #[serde(default)]
    pub findings: Vec<Finding>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl EvaluateResponse {
    /// A successful response with no findings.
    pub fn empty() -> Self {
        Self {
            status: ResponseStatus::Success,
            errors: vec![],
            findings: vec![],
            metadata: BTreeMap::new(),
            timestamp: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }

    /// Joined error messages, for logging rejections.
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return "agent returned error status".to_string();
        }
        self.errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Compact JSON rendering for the log sink.
    pub fn render(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("<unrenderable response: {e}>"))
    }
}
