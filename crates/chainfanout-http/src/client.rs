//! HTTP JSON-RPC agent client backed by `reqwest`.
//!
//! No retry, circuit breaker or rate limiting: each Evaluate call is a single
//! POST whose deadline is enforced by the calling worker.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;

use chainfanout_core::{
    AgentClient, AgentEndpoint, AgentError, EvaluateRequest, EvaluateResponse, StartupError,
};

use crate::wire::{JsonRpcRequest, JsonRpcResponse};

/// Configuration for `HttpAgentClient`.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Bound on the startup reachability probe and on TCP connects.
    pub connect_timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// One connected agent.
pub struct HttpAgentClient {
    url: String,
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl HttpAgentClient {
    /// Establish a handle to `endpoint`, failing if the agent is unreachable.
    pub async fn connect(
        endpoint: &AgentEndpoint,
        config: &HttpClientConfig,
    ) -> Result<Self, StartupError> {
        let connect_err = |reason: String| StartupError::Connect {
            address: endpoint.url().to_string(),
            reason,
        };

        let probe = TcpStream::connect((endpoint.host(), endpoint.port()));
        match tokio::time::timeout(config.connect_timeout, probe).await {
            Ok(Ok(_stream)) => {}
            Ok(Err(e)) => return Err(connect_err(e.to_string())),
            Err(_) => {
                return Err(connect_err(format!(
                    "no answer within {}ms",
                    config.connect_timeout.as_millis()
                )))
            }
        }

        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| connect_err(e.to_string()))?;

        tracing::info!(agent = %endpoint, "connected to agent");
        Ok(Self {
            url: endpoint.url().to_string(),
            http,
            next_id: AtomicU64::new(1),
        })
    }

    async fn send_once(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, AgentError> {
        let resp = self
            .http
            .post(&self.url)
            .json(req)
            .send()
            .await
            .map_err(|e| AgentError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(AgentError::Http(format!("HTTP {status}: {body}")));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| AgentError::Http(e.to_string()))?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    async fn evaluate(&self, request: &EvaluateRequest) -> Result<EvaluateResponse, AgentError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let envelope = JsonRpcRequest::evaluate(id, request)?;
        tracing::trace!(agent = %self.url, id, request_id = %request.request_id(), "sending evaluate");

        let result = self
            .send_once(&envelope)
            .await?
            .into_result()
            .map_err(|e| AgentError::Rpc(e.into()))?;
        Ok(serde_json::from_value(result)?)
    }

    fn address(&self) -> &str {
        &self.url
    }
}

/// Connect to every endpoint in order. The first failure aborts startup.
pub async fn connect_all(
    endpoints: &[AgentEndpoint],
    config: &HttpClientConfig,
) -> Result<Vec<Arc<dyn AgentClient>>, StartupError> {
    let mut clients: Vec<Arc<dyn AgentClient>> = Vec::with_capacity(endpoints.len());
    for endpoint in endpoints {
        let client = HttpAgentClient::connect(endpoint, config).await?;
        clients.push(Arc::new(client));
    }
    Ok(clients)
}
