pub mod ask;
pub mod chat;

use std::io::Write;

use anyhow::{Result, anyhow};
use colored::Colorize;
use streamchat_ai::ChatEvent;
use tokio::sync::mpsc::UnboundedReceiver;

/// Print one request or turn until its terminal event.
///
/// Deltas are written as they arrive; a reply that arrived without deltas
/// is printed whole on completion. Returns the final text.
pub(crate) async fn print_reply(
    rx: &mut UnboundedReceiver<ChatEvent>,
    out: &mut impl Write,
) -> Result<String> {
    let mut streamed = false;
    while let Some(event) = rx.recv().await {
        match event {
            ChatEvent::StreamDelta(delta) => {
                write!(out, "{delta}")?;
                out.flush()?;
                streamed = true;
            }
            ChatEvent::Completed(text) => {
                if !streamed {
                    write!(out, "{text}")?;
                }
                writeln!(out)?;
                out.flush()?;
                return Ok(text);
            }
            ChatEvent::Failed(message) => {
                if streamed {
                    writeln!(out)?;
                }
                return Err(anyhow!(message));
            }
            ChatEvent::Debug(message) => {
                eprintln!("{} {}", "[debug]".dimmed(), message);
            }
        }
    }
    Err(anyhow!("Request ended without a response"))
}

/// Discard notifications already queued, e.g. a rejected turn's failure.
pub(crate) fn drain_pending(rx: &mut UnboundedReceiver<ChatEvent>) {
    while rx.try_recv().is_ok() {}
}
