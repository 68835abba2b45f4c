//! Event sink wrapping the channel to the subscriber.

use deskclaw_core::event::AgentEvent;
use tokio::sync::mpsc;
use tracing::debug;

/// The subscriber went away; the turn loop should stop emitting.
#[derive(Debug)]
pub struct SinkClosed;

/// Thin wrapper around the event channel sender. A closed receiver is
/// surfaced as [`SinkClosed`] so the turn loop can unwind instead of
/// executing tools nobody will hear about.
pub struct EventSink {
    tx: mpsc::Sender<AgentEvent>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<AgentEvent>) -> Self {
        Self { tx }
    }

    pub async fn emit(&self, event: AgentEvent) -> Result<(), SinkClosed> {
        if self.tx.send(event).await.is_err() {
            debug!("event receiver dropped, stopping turn loop");
            return Err(SinkClosed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emit_into_open_channel() {
        let (tx, mut rx) = mpsc::channel(4);
        let sink = EventSink::new(tx);
        sink.emit(AgentEvent::Done).await.unwrap();
        assert!(matches!(rx.recv().await, Some(AgentEvent::Done)));
    }

    #[tokio::test]
    async fn emit_into_closed_channel_reports_closure() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let sink = EventSink::new(tx);
        assert!(sink.emit(AgentEvent::Done).await.is_err());
    }
}
