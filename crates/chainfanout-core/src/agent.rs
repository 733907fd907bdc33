//! The `AgentClient` trait and agent endpoint addressing.

use async_trait::async_trait;

use crate::error::{AgentError, StartupError};
use crate::request::{EvaluateRequest, EvaluateResponse};

/// Port agents listen on when the configured address carries none.
pub const DEFAULT_AGENT_PORT: u16 = 50051;

/// A connected handle to one remote evaluation agent.
///
/// # Thread Safety
/// Implementations must be `Send + Sync`; each handle is owned by exactly one
/// worker and called sequentially for the lifetime of the process.
///
/// # Object Safety
/// The trait is object-safe and is stored as `Arc<dyn AgentClient>`.
#[async_trait]
pub trait AgentClient: Send + Sync + 'static {
    /// Submit one request and wait for the agent's verdict.
    ///
    /// The caller enforces the deadline; implementations may rely on being
    /// dropped mid-call when it elapses.
    async fn evaluate(&self, request: &EvaluateRequest) -> Result<EvaluateResponse, AgentError>;

    /// The endpoint this handle talks to (used in logs).
    fn address(&self) -> &str;
}

/// A normalized agent address, e.g. `http://scanner-1:50051`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AgentEndpoint {
    url: String,
    host: String,
    port: u16,
}

impl AgentEndpoint {
    /// Parse a configured address.
    ///
    /// Accepts `host`, `host:port`, or `http(s)://host[:port][/path]`. A bare
    /// host gets the default agent port.
    pub fn parse(address: &str) -> Result<Self, StartupError> {
        let invalid = |reason: &str| StartupError::InvalidAddress {
            address: address.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = address.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty address"));
        }

        let (scheme, rest) = match trimmed.split_once("://") {
            Some((scheme @ ("http" | "https"), rest)) => (scheme, rest),
            Some((other, _)) => return Err(invalid(&format!("unsupported scheme '{other}'"))),
            None => ("http", trimmed),
        };

        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, ""),
        };
        if authority.is_empty() {
            return Err(invalid("missing host"));
        }

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| invalid("invalid port"))?;
                (host, port)
            }
            None => (authority, DEFAULT_AGENT_PORT),
        };
        if host.is_empty() {
            return Err(invalid("missing host"));
        }

        Ok(Self {
            url: format!("{scheme}://{host}:{port}{path}"),
            host: host.to_string(),
            port,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl std::fmt::Display for AgentEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url)
    }
}

impl std::str::FromStr for AgentEndpoint {
    type Err = StartupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
