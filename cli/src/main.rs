//! ChainFanout CLI — fan transaction events out to evaluation agents.
//!
//! # Commands
//! ```text
//! chainfanout run       [--config <file>] [--agent <addr>]... [--input <file|->]
//! chainfanout translate [--input <file|->]
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd_run;
mod cmd_translate;
mod config;
mod logging;
mod source;

use config::AppConfig;
use logging::{init_tracing, LogConfig};

#[derive(Parser)]
#[command(
    name = "chainfanout",
    about = "Stream blockchain transaction events to evaluation agents",
    long_about = "
ChainFanout reads newline-delimited JSON transaction events, translates each
one into a canonical message and submits it to every configured agent.

ENVIRONMENT VARIABLES:
  CHAINFANOUT_AGENTS   Comma-separated agent addresses (same as --agent)
",
    version
)]
struct Cli {
    /// Log level or filter directives, e.g. `debug` or `info,chainfanout_core=trace`
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit JSON structured logs
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the agents and dispatch every event from the input
    Run {
        /// JSON config file (agents, queue_capacity, call_timeout_ms, log)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Agent address: host, host:port or URL (repeatable)
        #[arg(long = "agent", env = "CHAINFANOUT_AGENTS", value_delimiter = ',')]
        agents: Vec<String>,
        /// Pending requests buffered per agent
        #[arg(long)]
        queue_capacity: Option<usize>,
        /// Per-call deadline in milliseconds
        #[arg(long)]
        call_timeout_ms: Option<u64>,
        /// Startup connect deadline per agent in milliseconds
        #[arg(long, default_value_t = 5_000)]
        connect_timeout_ms: u64,
        /// Event input, `-` for stdin
        #[arg(short, long, default_value = "-")]
        input: String,
    },

    /// Translate events and print the canonical messages without calling agents
    Translate {
        /// Event input, `-` for stdin
        #[arg(short, long, default_value = "-")]
        input: String,
    },
}

impl Cli {
    fn log_config(&self, base: LogConfig) -> LogConfig {
        LogConfig {
            level: self.log_level.clone().unwrap_or(base.level),
            json: self.json_logs || base.json,
            ..base
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Run {
            config,
            agents,
            queue_capacity,
            call_timeout_ms,
            connect_timeout_ms,
            input,
        } => {
            let mut app = match config {
                Some(path) => AppConfig::load(path)?,
                None => AppConfig::default(),
            };
            if !agents.is_empty() {
                app.fanout.agents = agents.clone();
            }
            if let Some(capacity) = queue_capacity {
                app.fanout.queue_capacity = *capacity;
            }
            if let Some(ms) = call_timeout_ms {
                app.fanout.call_timeout_ms = *ms;
            }

            init_tracing(&cli.log_config(app.log.clone()));
            cmd_run::run(cmd_run::RunOptions {
                fanout: app.fanout,
                connect_timeout: Duration::from_millis(*connect_timeout_ms),
                input: input.clone(),
            })
            .await
        }

        Commands::Translate { input } => {
            init_tracing(&cli.log_config(LogConfig::default()));
            cmd_translate::run(input).await
        }
    }
}
