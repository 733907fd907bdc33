//! Error types for the fan-out pipeline.

use thiserror::Error;

/// Errors raised while converting a raw transaction event into a canonical message.
///
/// Always recoverable: the event is dropped and dispatch continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("Invalid hex quantity in '{field}': {value}")]
    InvalidQuantity { field: &'static str, value: String },

    #[error("Invalid hash in '{field}': expected 32 bytes, got {value}")]
    InvalidHash { field: &'static str, value: String },

    #[error("Invalid address in '{field}': expected 20 bytes, got {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("Invalid hex data in '{field}': {reason}")]
    InvalidData { field: &'static str, reason: String },

    #[error("Unsupported event: {reason}")]
    Unsupported { reason: String },
}

/// A JSON-RPC-style error object returned by an agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    pub code: i64,
    pub message: String,
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Errors from a single Evaluate call. Recovered locally by the worker.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Request exceeded the per-call deadline and was abandoned.
    #[error("Evaluate call timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Connection refused, reset, non-2xx status, etc.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Protocol-level error object returned by the agent.
    #[error("RPC error {0}")]
    Rpc(RemoteError),

    /// Agent answered but reported an error status for the request.
    #[error("Agent rejected request: {reason}")]
    Rejected { reason: String },

    /// Response body could not be deserialized.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl AgentError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if the agent processed the request and refused it.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. } | Self::Rpc(_))
    }
}

/// Failure of the event source itself (not of an individual event).
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Source closed unexpectedly: {0}")]
    Closed(String),

    #[error("{0}")]
    Other(String),
}

/// Terminal errors of [`crate::Dispatcher::run`].
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The event source failed.
    #[error("Event source failed: {0}")]
    Source(#[from] SourceError),

    /// The shared cancellation signal was observed.
    #[error("Dispatch cancelled")]
    Cancelled,

    /// A worker's queue was closed while ingestion was still placing requests.
    #[error("Queue for agent '{agent}' closed unexpectedly")]
    QueueClosed { agent: String },

    /// A dispatcher task panicked or was aborted.
    #[error("Task failed: {reason}")]
    TaskFailed { reason: String },

    /// No agents were configured.
    #[error("No agents configured")]
    NoAgents,
}

impl DispatchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Errors that prevent the process from starting. Never retried.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Invalid agent address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Could not connect to agent {address}: {reason}")]
    Connect { address: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Configuration loading / validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {reason}")]
    Invalid { reason: String },
}
