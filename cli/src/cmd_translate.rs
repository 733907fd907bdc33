//! `chainfanout translate` — dry run of the event → message translation.
//!
//! Prints one JSON object per event to stdout: `{"message": …}` on success,
//! `{"error": "…"}` when the event cannot be translated.

use std::io::Write;

use anyhow::Result;
use chainfanout_core::ToMessage;
use futures::StreamExt;
use serde_json::json;

use crate::source;

pub async fn run(input: &str) -> Result<()> {
    let mut events = source::open(input).await?;
    let mut out = std::io::stdout();

    let (mut ok, mut failed) = (0u64, 0u64);
    while let Some(item) = events.next().await {
        let event = item?;
        let line = match event.to_message() {
            Ok(message) => {
                ok += 1;
                json!({ "message": message })
            }
            Err(e) => {
                failed += 1;
                json!({ "error": e.to_string() })
            }
        };
        writeln!(out, "{line}")?;
    }

    tracing::info!(translated = ok, failed, "translation finished");
    Ok(())
}
