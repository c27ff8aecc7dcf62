//! Run events.
//!
//! Every state transition of the run engine becomes an ordered,
//! timestamped, uniquely-identified event record. This is the only way
//! external observers learn of loop and gate state. Emission is
//! fire-and-forget over an unbounded channel; the loop never blocks on
//! an observer.

use crate::run::RunOutcome;
use futures::Stream;
use serde::Serialize;
use serde_json::Value;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Events emitted during a run
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// Run accepted a user request
    RunStarted {
        run_id: Uuid,
        input: String,
    },
    /// The LLM proposed a tool call
    ToolCallProposed {
        call_id: String,
        tool: String,
        arguments: Value,
    },
    /// A confirmation request is open and awaiting a decision
    ConfirmationRequested {
        call_id: String,
        tool: String,
        arguments: Value,
        prompt: String,
    },
    /// The confirmation request was decided
    ConfirmationResolved {
        call_id: String,
        approved: bool,
        reason: Option<String>,
    },
    /// Tool execution finished (successfully or not)
    ToolCallFinished {
        call_id: String,
        tool: String,
        output: String,
        is_error: bool,
        duration_ms: u64,
    },
    /// Plain assistant text
    TextContent {
        text: String,
    },
    /// Run reached a terminal outcome
    RunFinished {
        run_id: Uuid,
        outcome: RunOutcome,
        result: String,
    },
    /// Fatal provider failure
    RunError {
        run_id: Uuid,
        message: String,
    },
}

/// An event record with identity and timing, in the original wire shape:
/// id + type tag + timestamp + payload.
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    pub id: Uuid,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(flatten)]
    pub event: RunEvent,
}

impl EventEnvelope {
    pub fn new(event: RunEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
            event,
        }
    }
}

/// Sender half used by the run engine
pub type EventSender = mpsc::UnboundedSender<EventEnvelope>;

/// Wrap an event and send it, ignoring a closed channel: observers may
/// go away, the run does not care.
pub fn emit(tx: &EventSender, event: RunEvent) {
    let _ = tx.send(EventEnvelope::new(event));
}

/// Receiver side exposed as a `Stream` for observers that consume
/// events with stream combinators.
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<EventEnvelope>,
}

impl EventStream {
    pub fn new(rx: mpsc::UnboundedReceiver<EventEnvelope>) -> Self {
        Self { rx }
    }

    pub async fn recv(&mut self) -> Option<EventEnvelope> {
        self.rx.recv().await
    }
}

impl Stream for EventStream {
    type Item = EventEnvelope;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<EventEnvelope>> {
        self.rx.poll_recv(cx)
    }
}

/// Create a connected sender/stream pair for one run.
pub fn event_channel() -> (EventSender, EventStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, EventStream::new(rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn test_envelope_serializes_with_stable_tag() {
        let envelope = EventEnvelope::new(RunEvent::TextContent {
            text: "hello".to_string(),
        });
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["type"], "text_content");
        assert_eq!(json["text"], "hello");
        assert!(json["id"].is_string());
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_channel_preserves_emission_order() {
        let (tx, stream) = event_channel();
        let run_id = Uuid::new_v4();
        emit(&tx, RunEvent::RunStarted {
            run_id,
            input: "q".to_string(),
        });
        emit(&tx, RunEvent::TextContent {
            text: "a".to_string(),
        });
        emit(&tx, RunEvent::RunFinished {
            run_id,
            outcome: crate::run::RunOutcome::Completed,
            result: "a".to_string(),
        });
        drop(tx);

        let tags: Vec<String> = stream
            .map(|e| {
                serde_json::to_value(&e).unwrap()["type"]
                    .as_str()
                    .unwrap()
                    .to_string()
            })
            .collect()
            .await;
        assert_eq!(tags, vec!["run_started", "text_content", "run_finished"]);
    }

    #[test]
    fn test_emit_to_closed_channel_is_silent() {
        let (tx, stream) = event_channel();
        drop(stream);
        emit(&tx, RunEvent::TextContent {
            text: "nobody listening".to_string(),
        });
    }
}
