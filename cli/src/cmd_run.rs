//! `chainfanout run` — connect to agents and stream events through them.

use std::time::Duration;

use anyhow::{Context, Result};
use chainfanout_core::{DispatchError, Dispatcher, FanoutConfig, Shutdown};
use chainfanout_http::{connect_all, HttpClientConfig};

use crate::source;

/// Settings resolved from the config file and command-line overrides.
pub struct RunOptions {
    pub fanout: FanoutConfig,
    pub connect_timeout: Duration,
    pub input: String,
}

pub async fn run(opts: RunOptions) -> Result<()> {
    opts.fanout.validate().context("invalid configuration")?;
    let endpoints = opts.fanout.endpoints()?;

    let http = HttpClientConfig {
        connect_timeout: opts.connect_timeout,
    };
    let agents = connect_all(&endpoints, &http)
        .await
        .context("agent startup failed")?;

    let events = source::open(&opts.input).await?;

    let shutdown = Shutdown::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
            signal.trigger();
        }
    });

    let dispatcher = Dispatcher::new(opts.fanout.dispatch(), agents)
        .with_name("chainfanout")
        .with_shutdown(shutdown);
    match dispatcher.run(events).await {
        Ok(summary) => {
            for worker in &summary.workers {
                tracing::info!(
                    agent = %worker.agent,
                    succeeded = worker.succeeded,
                    failed = worker.failed,
                    rejected = worker.rejected,
                    timed_out = worker.timed_out,
                    "agent totals"
                );
            }
            Ok(())
        }
        Err(DispatchError::Cancelled) => {
            tracing::info!("stopped by operator");
            Ok(())
        }
        Err(e) => Err(e).context("dispatch failed"),
    }
}
