//! JSON-RPC 2.0 envelope for agent calls.

use chainfanout_core::error::RemoteError;
use chainfanout_core::EvaluateRequest;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The one method every agent serves.
pub const EVALUATE_METHOD: &str = "agent_evaluate";

/// JSON-RPC request ID. Agents echo our numeric ids; a parse failure is
/// answered with `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcId {
    Number(u64),
    Null,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: Vec<Value>,
    pub id: RpcId,
}

impl JsonRpcRequest {
    /// Wrap an Evaluate request as `agent_evaluate([request])`.
    pub fn evaluate(id: u64, request: &EvaluateRequest) -> Result<Self, serde_json::Error> {
        Ok(Self {
            jsonrpc: "2.0".into(),
            method: EVALUATE_METHOD.into(),
            params: vec![serde_json::to_value(request)?],
            id: RpcId::Number(id),
        })
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl From<JsonRpcError> for RemoteError {
    fn from(e: JsonRpcError) -> Self {
        RemoteError {
            code: e.code,
            message: e.message,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: RpcId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Unwrap the result value or return the error object.
    pub fn into_result(self) -> Result<Value, JsonRpcError> {
        if let Some(err) = self.error {
            Err(err)
        } else {
            Ok(self.result.unwrap_or(Value::Null))
        }
    }
}
