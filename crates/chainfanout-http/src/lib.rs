//! chainfanout-http — JSON-RPC over HTTP transport for evaluation agents.
//!
//! Each agent exposes a single JSON-RPC method, `agent_evaluate`, taking the
//! tagged request as its only positional parameter and returning an
//! `EvaluateResponse` as the result.

pub mod client;
pub mod wire;

pub use client::{connect_all, HttpAgentClient, HttpClientConfig};
pub use wire::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId, EVALUATE_METHOD};
