//! Newline-delimited JSON event source (stdin or a file).

use std::io::BufRead;
use std::path::Path;
use std::pin::Pin;

use anyhow::{Context, Result};
use chainfanout_core::{
    EventStream, SourceError, ToMessage, TransactionEvent, TransactionMessage, TranslateError,
};
use futures::{stream, Stream, StreamExt};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

type LineStream = Pin<Box<dyn Stream<Item = std::io::Result<String>> + Send>>;

/// One input line, decoded or not.
///
/// Lines that are not valid JSON events still flow to the dispatcher so they
/// are counted and logged as translation errors.
#[derive(Debug, Clone)]
pub enum InputEvent {
    Decoded(TransactionEvent),
    Undecodable { line: u64, reason: String },
}

impl ToMessage for InputEvent {
    fn to_message(&self) -> Result<TransactionMessage, TranslateError> {
        match self {
            Self::Decoded(event) => event.to_message(),
            Self::Undecodable { line, reason } => Err(TranslateError::InvalidData {
                field: "event",
                reason: format!("line {line}: {reason}"),
            }),
        }
    }
}

/// Open `-` as stdin, anything else as a file path.
pub async fn open(input: &str) -> Result<EventStream<InputEvent>> {
    if input == "-" {
        let lines = blocking_lines(|| std::io::stdin().lock()).context("start stdin reader")?;
        return Ok(events(lines));
    }
    let file = tokio::fs::File::open(Path::new(input))
        .await
        .with_context(|| format!("open input '{input}'"))?;
    Ok(json_lines(BufReader::new(file)))
}

/// Lines from an async reader.
pub fn json_lines<R>(reader: R) -> EventStream<InputEvent>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let lines = stream::unfold(reader.lines(), |mut lines| async move {
        lines.next_line().await.transpose().map(|line| (line, lines))
    });
    events(Box::pin(lines))
}

/// Lines read on a dedicated OS thread.
///
/// A blocked read on stdin cannot be cancelled. Keeping it off the runtime's
/// blocking pool lets the process exit on shutdown while the read is pending.
pub fn blocking_lines<F, R>(open: F) -> std::io::Result<LineStream>
where
    F: FnOnce() -> R + Send + 'static,
    R: BufRead,
{
    let (tx, rx) = mpsc::channel::<std::io::Result<String>>(64);
    std::thread::Builder::new()
        .name("chainfanout-input".into())
        .spawn(move || {
            for line in open().lines() {
                let failed = line.is_err();
                if tx.blocking_send(line).is_err() || failed {
                    break;
                }
            }
        })?;

    Ok(Box::pin(stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|line| (line, rx))
    })))
}

/// One event per non-blank line. A read error is yielded once as
/// `SourceError::Io` and ends the stream.
fn events(lines: LineStream) -> EventStream<InputEvent> {
    Box::pin(stream::unfold(Some((lines, 0u64)), |state| async move {
        let (mut lines, mut line_no) = state?;
        loop {
            line_no += 1;
            match lines.next().await {
                None => return None,
                Some(Ok(raw)) => {
                    let trimmed = raw.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    let event = match serde_json::from_str::<TransactionEvent>(trimmed) {
                        Ok(event) => InputEvent::Decoded(event),
                        Err(e) => InputEvent::Undecodable {
                            line: line_no,
                            reason: e.to_string(),
                        },
                    };
                    return Some((Ok(event), Some((lines, line_no))));
                }
                Some(Err(e)) => {
                    tracing::error!(line = line_no, error = %e, "failed reading event input");
                    return Some((Err(SourceError::Io(e)), None));
                }
            }
        }
    }))
}
