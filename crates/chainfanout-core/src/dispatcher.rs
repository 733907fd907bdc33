//! `Dispatcher` — ingestion loop, per-agent fan-out, and task supervision.
//!
//! ```text
//! ingest task:  source ─► translate ─► tag ─► send(queue[0]) ─► … ─► send(queue[N-1])
//! worker tasks: queue[i] ─► AgentWorker ─► AgentClient::evaluate (timed)
//! supervisor:   JoinSet; first error wins and raises the Shutdown signal
//! ```

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::agent::AgentClient;
use crate::error::{DispatchError, SourceError};
use crate::request::EvaluateRequest;
use crate::shutdown::Shutdown;
use crate::translate::ToMessage;
use crate::worker::{AgentWorker, WorkerStats};

/// A lazy, possibly unbounded sequence of events. Ends on exhaustion; an
/// `Err` item is a fatal source failure.
pub type EventStream<E> = Pin<Box<dyn Stream<Item = Result<E, SourceError>> + Send>>;

/// Runtime parameters, fixed for the dispatcher's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Pending requests buffered per agent before ingestion blocks.
    pub queue_capacity: usize,
    /// Upper bound on a single Evaluate call.
    pub call_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            call_timeout: Duration::from_secs(5),
        }
    }
}

/// Counters reported by a clean run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSummary {
    pub events_received: u64,
    pub translate_errors: u64,
    /// Request copies placed on agent queues (events × agents).
    pub requests_dispatched: u64,
    /// One entry per agent, in configured order.
    pub workers: Vec<WorkerStats>,
}

#[derive(Debug, Default)]
struct IngestStats {
    events_received: u64,
    translate_errors: u64,
    requests_dispatched: u64,
}

struct AgentQueue {
    agent: String,
    tx: mpsc::Sender<EvaluateRequest>,
}

enum TaskOutcome {
    Ingest(Result<IngestStats, DispatchError>),
    Worker(usize, Result<WorkerStats, DispatchError>),
}

/// Fans every translated event out to all configured agents.
pub struct Dispatcher {
    name: String,
    config: DispatchConfig,
    agents: Vec<Arc<dyn AgentClient>>,
    shutdown: Shutdown,
}

impl Dispatcher {
    /// Build a dispatcher over already-connected agent handles, in the order
    /// requests should be placed on their queues.
    pub fn new(config: DispatchConfig, agents: Vec<Arc<dyn AgentClient>>) -> Self {
        Self {
            name: "fanout".to_string(),
            config,
            agents,
            shutdown: Shutdown::new(),
        }
    }

    /// Label attached to the dispatcher's lifecycle logs.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Use an externally owned cancellation signal (e.g. wired to Ctrl-C).
    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// A handle that can request shutdown while `run` is in progress.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Run until the source is exhausted and every worker has drained, or
    /// until the first error.
    ///
    /// Returns the first error reported by ingestion or any worker. The
    /// shutdown signal is raised as soon as that error is seen, and
    /// unconditionally once every task has finished.
    pub async fn run<E>(self, source: EventStream<E>) -> Result<DispatchSummary, DispatchError>
    where
        E: ToMessage + Send + 'static,
    {
        if self.agents.is_empty() {
            return Err(DispatchError::NoAgents);
        }
        let agent_count = self.agents.len();
        let capacity = self.config.queue_capacity.max(1);

        tracing::info!(
            dispatcher = %self.name,
            agents = agent_count,
            queue_capacity = capacity,
            call_timeout_ms = self.config.call_timeout.as_millis() as u64,
            "dispatcher starting"
        );

        let mut tasks = JoinSet::new();
        let mut queues = Vec::with_capacity(agent_count);

        for (index, client) in self.agents.into_iter().enumerate() {
            let (tx, rx) = mpsc::channel(capacity);
            queues.push(AgentQueue {
                agent: client.address().to_string(),
                tx,
            });
            let shutdown = self.shutdown.clone();
            let call_timeout = self.config.call_timeout;
            tasks.spawn(async move {
                let mut worker = AgentWorker::new(index, client, call_timeout);
                TaskOutcome::Worker(index, worker.run(rx, shutdown).await)
            });
        }

        let shutdown = self.shutdown.clone();
        tasks.spawn(async move { TaskOutcome::Ingest(ingest(source, queues, shutdown).await) });

        let mut first_error: Option<DispatchError> = None;
        let mut record = |err: DispatchError, shutdown: &Shutdown| {
            if first_error.is_none() {
                if err.is_cancelled() {
                    tracing::info!("dispatch cancelled, stopping all tasks");
                } else {
                    tracing::error!(error = %err, "dispatch failed, stopping all tasks");
                }
                shutdown.trigger();
                first_error = Some(err);
            } else {
                tracing::debug!(error = %err, "additional task error after first failure");
            }
        };

        let mut ingest_stats = IngestStats::default();
        let mut worker_stats: Vec<Option<WorkerStats>> = vec![None; agent_count];

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(TaskOutcome::Ingest(Ok(stats))) => ingest_stats = stats,
                Ok(TaskOutcome::Worker(index, Ok(stats))) => worker_stats[index] = Some(stats),
                Ok(TaskOutcome::Ingest(Err(e))) | Ok(TaskOutcome::Worker(_, Err(e))) => {
                    record(e, &self.shutdown)
                }
                Err(join_err) => record(
                    DispatchError::TaskFailed {
                        reason: join_err.to_string(),
                    },
                    &self.shutdown,
                ),
            }
        }

        // Release anything still waiting on the signal.
        self.shutdown.trigger();

        if let Some(err) = first_error {
            tracing::info!(dispatcher = %self.name, error = %err, "dispatcher stopped");
            return Err(err);
        }

        let summary = DispatchSummary {
            events_received: ingest_stats.events_received,
            translate_errors: ingest_stats.translate_errors,
            requests_dispatched: ingest_stats.requests_dispatched,
            workers: worker_stats.into_iter().flatten().collect(),
        };
        tracing::info!(
            dispatcher = %self.name,
            events = summary.events_received,
            translate_errors = summary.translate_errors,
            dispatched = summary.requests_dispatched,
            "dispatcher finished"
        );
        Ok(summary)
    }
}

/// The ingestion loop. Dropping `queues` on return closes every agent queue
/// exactly once, whichever way the loop ends.
async fn ingest<E: ToMessage>(
    mut source: EventStream<E>,
    queues: Vec<AgentQueue>,
    shutdown: Shutdown,
) -> Result<IngestStats, DispatchError> {
    let mut stats = IngestStats::default();

    loop {
        if shutdown.is_triggered() {
            return Err(DispatchError::Cancelled);
        }
        let item = tokio::select! {
            biased;
            _ = shutdown.triggered() => return Err(DispatchError::Cancelled),
            item = source.next() => item,
        };

        let event = match item {
            None => break,
            Some(Err(e)) => {
                tracing::error!(error = %e, "event source failed");
                return Err(DispatchError::Source(e));
            }
            Some(Ok(event)) => event,
        };
        stats.events_received += 1;

        let message = match event.to_message() {
            Ok(message) => message,
            Err(e) => {
                stats.translate_errors += 1;
                tracing::warn!(error = %e, "error converting tx event to message");
                continue;
            }
        };

        let request = EvaluateRequest::tag(message);
        tracing::debug!(
            request_id = %request.request_id(),
            tx_hash = %request.event().transaction.hash,
            "dispatching request"
        );

        // Configured order; a full queue blocks here until its worker catches up.
        for queue in &queues {
            if shutdown.is_triggered() {
                return Err(DispatchError::Cancelled);
            }
            tokio::select! {
                biased;
                _ = shutdown.triggered() => return Err(DispatchError::Cancelled),
                sent = queue.tx.send(request.clone()) => {
                    sent.map_err(|_| DispatchError::QueueClosed { agent: queue.agent.clone() })?;
                }
            }
            stats.requests_dispatched += 1;
        }
    }

    tracing::info!(
        events = stats.events_received,
        translate_errors = stats.translate_errors,
        "event source exhausted, closing agent queues"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AgentError, TranslateError};
    use crate::event::{BlockInfo, TransactionInfo, TransactionMessage};
    use crate::request::EvaluateResponse;
    use async_trait::async_trait;

    /// Minimal event: `Some(n)` translates, `None` is malformed.
    struct TestEvent(Option<u64>);

    impl ToMessage for TestEvent {
        fn to_message(&self) -> Result<TransactionMessage, TranslateError> {
            let n = self.0.ok_or(TranslateError::MissingField { field: "transaction" })?;
            Ok(TransactionMessage {
                chain_id: 1,
                block: BlockInfo {
                    number: n,
                    hash: "0x0".into(),
                    timestamp: 0,
                },
                transaction: TransactionInfo {
                    hash: format!("0x{n:x}"),
                    from: "0x1".into(),
                    to: None,
                    nonce: n,
                    gas: 21_000,
                    gas_price: "0x1".into(),
                    value: "0x0".into(),
                    input: "0x".into(),
                },
                receipt: None,
            })
        }
    }

    struct OkAgent(String);

    #[async_trait]
    impl AgentClient for OkAgent {
        async fn evaluate(&self, _req: &EvaluateRequest) -> Result<EvaluateResponse, AgentError> {
            Ok(EvaluateResponse::empty())
        }
        fn address(&self) -> &str {
            &self.0
        }
    }

    fn source(items: Vec<Result<TestEvent, SourceError>>) -> EventStream<TestEvent> {
        Box::pin(futures::stream::iter(items))
    }

    fn agents(n: usize) -> Vec<Arc<dyn AgentClient>> {
        (0..n)
            .map(|i| Arc::new(OkAgent(format!("http://agent-{i}:50051"))) as Arc<dyn AgentClient>)
            .collect()
    }

    #[test]
    fn name_defaults_and_overrides() {
        let d = Dispatcher::new(DispatchConfig::default(), agents(1));
        assert_eq!(d.name(), "fanout");
        assert_eq!(d.with_name("tx-analyzer").name(), "tx-analyzer");
    }

    #[tokio::test]
    async fn no_agents_is_an_error() {
        let d = Dispatcher::new(DispatchConfig::default(), vec![]);
        let err = d.run(source(vec![])).await.unwrap_err();
        assert!(matches!(err, DispatchError::NoAgents));
    }

    #[tokio::test]
    async fn empty_source_finishes_cleanly() {
        let d = Dispatcher::new(DispatchConfig::default(), agents(2));
        let handle = d.shutdown_handle();
        let summary = d.run(source(vec![])).await.unwrap();
        assert_eq!(summary.events_received, 0);
        assert_eq!(summary.workers.len(), 2);
        assert!(handle.is_triggered());
    }

    #[tokio::test]
    async fn counts_translate_errors_and_dispatches() {
        let d = Dispatcher::new(DispatchConfig::default(), agents(3));
        let events = vec![Ok(TestEvent(Some(1))), Ok(TestEvent(None)), Ok(TestEvent(Some(2)))];
        let summary = d.run(source(events)).await.unwrap();
        assert_eq!(summary.events_received, 3);
        assert_eq!(summary.translate_errors, 1);
        assert_eq!(summary.requests_dispatched, 6);
        assert!(summary.workers.iter().all(|w| w.succeeded == 2));
        assert_eq!(summary.workers[1].agent, "http://agent-1:50051");
    }

    #[tokio::test]
    async fn source_failure_is_terminal() {
        let d = Dispatcher::new(DispatchConfig::default(), agents(2));
        let events = vec![
            Ok(TestEvent(Some(1))),
            Err(SourceError::Closed("feed dropped".into())),
            Ok(TestEvent(Some(2))),
        ];
        let err = d.run(source(events)).await.unwrap_err();
        assert!(matches!(err, DispatchError::Source(SourceError::Closed(_))));
    }

    #[tokio::test]
    async fn pre_triggered_shutdown_cancels() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        let d = Dispatcher::new(DispatchConfig::default(), agents(1)).with_shutdown(shutdown);
        let err = d.run(source(vec![Ok(TestEvent(Some(1)))])).await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
