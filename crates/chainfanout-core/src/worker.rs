//! Agent worker — drains one agent's queue into timed Evaluate calls.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::agent::AgentClient;
use crate::error::{AgentError, DispatchError};
use crate::request::{EvaluateRequest, EvaluateResponse};
use crate::shutdown::Shutdown;

/// Lifecycle of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerState {
    /// Constructed, not yet pulling from its queue.
    Idle,
    /// Pulling requests and calling the agent.
    Running,
    /// Queue closed (or cancellation observed); releasing the queue.
    Draining,
    /// Terminated.
    Stopped,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Draining => write!(f, "draining"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Per-worker counters, reported when the worker stops.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStats {
    pub agent: String,
    /// Requests pulled from the queue.
    pub received: u64,
    pub succeeded: u64,
    /// Transport and protocol failures.
    pub failed: u64,
    /// Calls the agent answered with an error status or error object.
    pub rejected: u64,
    pub timed_out: u64,
}

/// Owns one agent handle and consumes that agent's private queue.
pub struct AgentWorker {
    index: usize,
    client: Arc<dyn AgentClient>,
    call_timeout: Duration,
    state: WorkerState,
}

impl AgentWorker {
    pub fn new(index: usize, client: Arc<dyn AgentClient>, call_timeout: Duration) -> Self {
        Self {
            index,
            client,
            call_timeout,
            state: WorkerState::Idle,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn address(&self) -> &str {
        self.client.address()
    }

    fn transition(&mut self, next: WorkerState) {
        tracing::debug!(
            agent = %self.client.address(),
            index = self.index,
            from = %self.state,
            to = %next,
            "worker state change"
        );
        self.state = next;
    }

    /// Process requests until the queue is closed and empty (`Ok`) or the
    /// shutdown signal fires (`Err(Cancelled)`).
    ///
    /// An in-flight call is never interrupted by the shutdown signal; only
    /// the per-call timeout bounds it. Requests still queued at cancellation
    /// are discarded.
    pub async fn run(
        &mut self,
        mut inbox: mpsc::Receiver<EvaluateRequest>,
        shutdown: Shutdown,
    ) -> Result<WorkerStats, DispatchError> {
        let mut stats = WorkerStats {
            agent: self.client.address().to_string(),
            ..Default::default()
        };
        self.transition(WorkerState::Running);

        let result = loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.triggered() => break Err(DispatchError::Cancelled),
                next = inbox.recv() => next,
            };
            match next {
                Some(request) => {
                    stats.received += 1;
                    self.process(&request, &mut stats).await;
                }
                None => break Ok(()),
            }
        };

        self.transition(WorkerState::Draining);
        inbox.close();
        self.transition(WorkerState::Stopped);

        tracing::info!(
            agent = %stats.agent,
            received = stats.received,
            succeeded = stats.succeeded,
            failed = stats.failed,
            rejected = stats.rejected,
            timed_out = stats.timed_out,
            cancelled = result.is_err(),
            "agent worker stopped"
        );

        result.map(|()| stats)
    }

    async fn process(&self, request: &EvaluateRequest, stats: &mut WorkerStats) {
        let started = Instant::now();
        let outcome = self.call(request).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(response) => {
                stats.succeeded += 1;
                tracing::info!(
                    agent = %self.client.address(),
                    request_id = %request.request_id(),
                    tx_hash = %request.event().transaction.hash,
                    findings = response.findings.len(),
                    elapsed_ms,
                    result = %response.render(),
                    "agent evaluation result"
                );
            }
            Err(e) => {
                if e.is_timeout() {
                    stats.timed_out += 1;
                } else if e.is_rejection() {
                    stats.rejected += 1;
                } else {
                    stats.failed += 1;
                }
                tracing::warn!(
                    agent = %self.client.address(),
                    request_id = %request.request_id(),
                    tx_hash = %request.event().transaction.hash,
                    elapsed_ms,
                    error = %e,
                    "error invoking agent"
                );
            }
        }
    }

    /// One Evaluate call bounded by the per-call timeout. No retry.
    async fn call(&self, request: &EvaluateRequest) -> Result<EvaluateResponse, AgentError> {
        let response = tokio::time::timeout(self.call_timeout, self.client.evaluate(request))
            .await
            .map_err(|_| AgentError::Timeout {
                ms: self.call_timeout.as_millis() as u64,
            })??;

        if response.is_success() {
            Ok(response)
        } else {
            Err(AgentError::Rejected {
                reason: response.error_summary(),
            })
        }
    }
}
