//! chainfanout-core — fan-out of blockchain transaction events to evaluation agents.
//!
//! # Architecture
//!
//! ```text
//! EventStream (producer, ends on exhaustion)
//!       │
//!       ▼
//! ToMessage::to_message        (translate, drop + log on failure)
//!       │
//!       ▼
//! EvaluateRequest::tag         (fresh CorrelationId)
//!       │
//!       ├──► mpsc(capacity) ──► AgentWorker #0 ──► AgentClient::evaluate
//!       ├──► mpsc(capacity) ──► AgentWorker #1 ──► AgentClient::evaluate
//!       └──► mpsc(capacity) ──► AgentWorker #N ──► AgentClient::evaluate
//! ```
//!
//! The [`Dispatcher`] owns the ingestion task and one [`AgentWorker`] task per
//! agent. Bounded queues are the only backpressure; a shared [`Shutdown`]
//! signal coordinates cancellation.

pub mod agent;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod request;
pub mod shutdown;
pub mod translate;
pub mod worker;

pub use agent::{AgentClient, AgentEndpoint, DEFAULT_AGENT_PORT};
pub use config::FanoutConfig;
pub use dispatcher::{DispatchConfig, DispatchSummary, Dispatcher, EventStream};
pub use error::{AgentError, ConfigError, DispatchError, SourceError, StartupError, TranslateError};
pub use event::{TransactionEvent, TransactionMessage};
pub use request::{CorrelationId, EvaluateRequest, EvaluateResponse, Finding, ResponseStatus};
pub use shutdown::Shutdown;
pub use translate::{translate, ToMessage};
pub use worker::{AgentWorker, WorkerState, WorkerStats};
