//! Debounced render requests for the live preview.
//!
//! Text changes are collapsed into at most one render request per quiet
//! period. The scheduler runs as a single task: debounce, cancellation and
//! reply application are steps of one `select!` loop, so a superseded timer
//! can never fire late.

use super::channel::{ChannelError, ChannelState, EventChannel};
use super::state::EditorState;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, trace, warn};
use wiki_types::bus::MARKDOWN_ADDRESS;

/// Default quiet period before a render request is issued.
pub const DEFAULT_QUIESCENCE: Duration = Duration::from_millis(300);

/// The one deferred render: the text captured for the next request.
struct PendingRender {
    deadline: Instant,
    text: String,
}

pub struct RenderScheduler {
    texts: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

impl RenderScheduler {
    pub fn spawn(channel: Arc<dyn EventChannel>, state: EditorState, quiescence: Duration) -> Self {
        let (texts, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(rx, channel, state, quiescence));
        Self { texts, task }
    }

    /// Record a text change. Cancels any pending render and restarts the quiet period.
    pub fn text_changed(&self, text: impl Into<String>) {
        if self.texts.send(text.into()).is_err() {
            warn!("Render scheduler stopped; dropping text change");
        }
    }
}

impl Drop for RenderScheduler {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    mut texts: mpsc::UnboundedReceiver<String>,
    channel: Arc<dyn EventChannel>,
    state: EditorState,
    quiescence: Duration,
) {
    let mut pending: Option<PendingRender> = None;
    let mut in_flight: JoinSet<(u64, Result<Value, ChannelError>)> = JoinSet::new();
    // Sequence number of the most recently issued request
    let mut issued: u64 = 0;

    loop {
        let deadline = pending.as_ref().map(|p| p.deadline);

        tokio::select! {
            text = texts.recv() => {
                let Some(text) = text else { break };
                if pending.is_some() {
                    trace!("Pending render superseded");
                }
                pending = Some(PendingRender {
                    deadline: Instant::now() + quiescence,
                    text,
                });
            }

            _ = async {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            } => {
                // Clear the marker first: the next change starts a fresh cycle
                let Some(render) = pending.take() else { continue };

                if channel.state() != ChannelState::Open {
                    debug!("Event channel not open; skipping render");
                    continue;
                }

                issued += 1;
                let seq = issued;
                let channel = channel.clone();
                in_flight.spawn(async move {
                    let result = channel.send(MARKDOWN_ADDRESS, Value::String(render.text)).await;
                    (seq, result)
                });
                trace!(seq, "Render request issued");
            }

            Some(joined) = in_flight.join_next() => {
                match joined {
                    Ok((seq, result)) => apply_reply(&state, seq, issued, result),
                    Err(e) => warn!("Render request task failed: {}", e),
                }
            }
        }
    }
}

/// Apply a settled render request. Only the latest issued request may
/// update the preview; older replies that arrive late are dropped.
fn apply_reply(state: &EditorState, seq: u64, latest: u64, result: Result<Value, ChannelError>) {
    match result {
        Ok(Value::String(html)) if seq == latest => state.set_rendering(html),
        Ok(Value::String(_)) => debug!(seq, latest, "Dropping stale rendering"),
        Ok(other) => warn!("Unexpected rendering reply: {}", other),
        Err(e) => warn!("Error rendering Markdown content: {}", e),
    }
}
