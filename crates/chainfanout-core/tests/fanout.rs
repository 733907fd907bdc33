//! End-to-end dispatcher tests with in-process mock agents.
//!
//! Each mock records the requests it sees (id, tx hash, arrival time) so the
//! tests can assert fan-out counts, per-agent ordering and backpressure.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chainfanout_core::event::{RawBlock, RawTransaction};
use chainfanout_core::{
    AgentClient, AgentError, DispatchConfig, DispatchError, Dispatcher, EvaluateRequest,
    EvaluateResponse, EventStream, Shutdown, SourceError, TransactionEvent,
};

// ─── Helpers ──────────────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
enum Mode {
    Instant,
    Latency(Duration),
    Hang,
}

#[derive(Debug, Clone)]
struct Seen {
    request_id: String,
    tx_hash: String,
    nonce: u64,
    at: Instant,
}

struct RecordingAgent {
    url: String,
    mode: Mode,
    seen: Mutex<Vec<Seen>>,
}

impl RecordingAgent {
    fn new(name: &str, mode: Mode) -> Arc<Self> {
        Arc::new(Self {
            url: format!("http://{name}:50051"),
            mode,
            seen: Mutex::new(vec![]),
        })
    }

    fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    fn nonces(&self) -> Vec<u64> {
        self.seen().into_iter().map(|s| s.nonce).collect()
    }
}

#[async_trait]
impl AgentClient for RecordingAgent {
    async fn evaluate(&self, req: &EvaluateRequest) -> Result<EvaluateResponse, AgentError> {
        self.seen.lock().unwrap().push(Seen {
            request_id: req.request_id().to_string(),
            tx_hash: req.event().transaction.hash.clone(),
            nonce: req.event().transaction.nonce,
            at: Instant::now(),
        });
        match self.mode {
            Mode::Instant => {}
            Mode::Latency(d) => tokio::time::sleep(d).await,
            Mode::Hang => std::future::pending::<()>().await,
        }
        Ok(EvaluateResponse::empty())
    }

    fn address(&self) -> &str {
        &self.url
    }
}

fn event(nonce: u64) -> TransactionEvent {
    TransactionEvent {
        chain_id: Some("0x1".into()),
        block: Some(RawBlock {
            number: Some(format!("0x{:x}", 19_000_000 + nonce)),
            hash: Some(format!("0x{:064x}", 0xb10c + nonce)),
            timestamp: Some("0x65a0b1c3".into()),
        }),
        transaction: Some(RawTransaction {
            hash: Some(format!("0x{:064x}", nonce + 1)),
            from: Some(format!("0x{:040x}", 0xa11ce)),
            to: Some(format!("0x{:040x}", 0xb0b)),
            nonce: Some(format!("0x{nonce:x}")),
            gas: Some("0x5208".into()),
            gas_price: Some("0x3b9aca00".into()),
            value: Some("0xde0b6b3a7640000".into()),
            input: Some("0x".into()),
        }),
        receipt: None,
    }
}

fn malformed(nonce: u64) -> TransactionEvent {
    let mut e = event(nonce);
    e.transaction.as_mut().unwrap().hash = Some("0xnothex".into());
    e
}

fn finite(events: Vec<TransactionEvent>) -> EventStream<TransactionEvent> {
    Box::pin(futures::stream::iter(events.into_iter().map(Ok)))
}

/// Unbounded source producing one event every `every`.
fn ticking(every: Duration) -> EventStream<TransactionEvent> {
    Box::pin(futures::stream::unfold(0u64, move |n| async move {
        tokio::time::sleep(every).await;
        Some((Ok::<_, SourceError>(event(n)), n + 1))
    }))
}

fn as_clients(agents: &[Arc<RecordingAgent>]) -> Vec<Arc<dyn AgentClient>> {
    agents
        .iter()
        .map(|a| Arc::clone(a) as Arc<dyn AgentClient>)
        .collect()
}

fn config(capacity: usize, timeout: Duration) -> DispatchConfig {
    DispatchConfig {
        queue_capacity: capacity,
        call_timeout: timeout,
    }
}

// ─── Fan-out ──────────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_agent_gets_one_copy_per_event() {
    let agents: Vec<_> = (0..4)
        .map(|i| RecordingAgent::new(&format!("agent-{i}"), Mode::Instant))
        .collect();
    let dispatcher = Dispatcher::new(config(100, Duration::from_secs(1)), as_clients(&agents));

    let summary = dispatcher
        .run(finite((0..10).map(event).collect()))
        .await
        .unwrap();

    assert_eq!(summary.events_received, 10);
    assert_eq!(summary.requests_dispatched, 40);

    let reference = agents[0].seen();
    assert_eq!(reference.len(), 10);
    for agent in &agents {
        let seen = agent.seen();
        assert_eq!(seen.len(), 10);
        for (a, b) in seen.iter().zip(&reference) {
            // same correlation id and payload across agents
            assert_eq!(a.request_id, b.request_id);
            assert_eq!(a.tx_hash, b.tx_hash);
        }
    }

    let mut ids: Vec<_> = reference.iter().map(|s| s.request_id.clone()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 10, "correlation ids must be distinct per event");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn translation_failures_are_skipped() {
    let agents = vec![
        RecordingAgent::new("a", Mode::Instant),
        RecordingAgent::new("b", Mode::Instant),
    ];
    let dispatcher = Dispatcher::new(config(4, Duration::from_secs(1)), as_clients(&agents));

    let events = vec![event(0), malformed(1), event(2), malformed(3), event(4)];
    let summary = dispatcher.run(finite(events)).await.unwrap();

    assert_eq!(summary.translate_errors, 2);
    assert_eq!(summary.requests_dispatched, 6);
    for agent in &agents {
        assert_eq!(agent.nonces(), vec![0, 2, 4]);
    }
}

// ─── Failure isolation ────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_agent_timing_out_does_not_affect_the_others() {
    // 3 agents, capacity 2, agent #2 never answers, 5 events.
    let agents = vec![
        RecordingAgent::new("agent-1", Mode::Instant),
        RecordingAgent::new("agent-2", Mode::Hang),
        RecordingAgent::new("agent-3", Mode::Instant),
    ];
    let timeout = Duration::from_millis(50);
    let dispatcher = Dispatcher::new(config(2, timeout), as_clients(&agents));

    let started = Instant::now();
    let summary = dispatcher
        .run(finite((0..5).map(event).collect()))
        .await
        .expect("dispatcher should succeed once the source is exhausted");

    assert_eq!(agents[0].nonces(), vec![0, 1, 2, 3, 4]);
    assert_eq!(agents[2].nonces(), vec![0, 1, 2, 3, 4]);
    assert_eq!(agents[1].nonces(), vec![0, 1, 2, 3, 4]);

    let w = &summary.workers;
    assert_eq!((w[0].succeeded, w[0].timed_out), (5, 0));
    assert_eq!((w[1].succeeded, w[1].timed_out), (0, 5));
    assert_eq!((w[2].succeeded, w[2].timed_out), (5, 0));

    // Five sequential timeouts, each bounded by the configured deadline.
    let elapsed = started.elapsed();
    assert!(elapsed >= timeout * 5, "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(5), "elapsed {elapsed:?}");
}

// ─── Backpressure ─────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn slow_agent_throttles_ingestion_but_preserves_order() {
    let latency = Duration::from_millis(40);
    let agents = vec![
        RecordingAgent::new("fast-1", Mode::Instant),
        RecordingAgent::new("slow", Mode::Latency(latency)),
        RecordingAgent::new("fast-2", Mode::Instant),
    ];
    let dispatcher = Dispatcher::new(config(1, Duration::from_secs(1)), as_clients(&agents));

    let started = Instant::now();
    dispatcher
        .run(finite((0..6).map(event).collect()))
        .await
        .unwrap();

    for agent in &agents {
        assert_eq!(agent.nonces(), vec![0, 1, 2, 3, 4, 5]);
    }

    // With one queued + one in-flight request the slow agent lets ingestion
    // run at most two events ahead, so the fast agents see event #5 only
    // after the slow agent has worked through event #3.
    let last_fast = agents[0].seen().last().unwrap().at;
    assert!(
        last_fast.duration_since(started) >= latency * 5 / 2,
        "fast agent was not throttled: {:?}",
        last_fast.duration_since(started)
    );
}

// ─── Shutdown ─────────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn external_shutdown_stops_an_unbounded_source() {
    let agents = vec![RecordingAgent::new("a", Mode::Instant)];
    let shutdown = Shutdown::new();
    let dispatcher = Dispatcher::new(config(8, Duration::from_secs(1)), as_clients(&agents))
        .with_shutdown(shutdown.clone());

    let handle = tokio::spawn(dispatcher.run(ticking(Duration::from_millis(5))));
    tokio::time::sleep(Duration::from_millis(60)).await;
    shutdown.trigger();

    let result = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("dispatcher did not stop")
        .unwrap();
    assert!(matches!(result, Err(DispatchError::Cancelled)));
    assert!(!agents[0].seen().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn in_flight_call_runs_to_its_timeout_on_shutdown() {
    let timeout = Duration::from_millis(200);
    let agents = vec![RecordingAgent::new("hang", Mode::Hang)];
    let dispatcher = Dispatcher::new(config(8, timeout), as_clients(&agents));
    let shutdown = dispatcher.shutdown_handle();

    let started = Instant::now();
    let handle = tokio::spawn(dispatcher.run(ticking(Duration::from_millis(10))));
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.trigger();

    let result = handle.await.unwrap();
    assert!(result.unwrap_err().is_cancelled());
    // The first call started at ~10ms and was allowed to hit its deadline.
    assert!(started.elapsed() >= Duration::from_millis(190));
    // Queued requests were discarded rather than evaluated.
    assert_eq!(agents[0].seen().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn source_error_cancels_workers() {
    let agents = vec![RecordingAgent::new("a", Mode::Instant)];
    let dispatcher = Dispatcher::new(config(8, Duration::from_secs(1)), as_clients(&agents));
    let shutdown = dispatcher.shutdown_handle();

    let source: EventStream<TransactionEvent> = Box::pin(futures::stream::iter(vec![
        Ok(event(0)),
        Err(SourceError::Other("upstream node disconnected".into())),
    ]));
    let err = dispatcher.run(source).await.unwrap_err();

    assert!(matches!(err, DispatchError::Source(_)));
    assert!(shutdown.is_triggered());
}
