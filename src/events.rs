//! Broadcast bus for engine events.
//!
//! Insight updates and chat progress are secondary, best-effort outputs:
//! delivery to a listener that is not subscribed is a no-op, and nothing
//! in the engine depends on an event being observed.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::{ChatPhase, Insight};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum EngineEvent {
    #[serde(rename_all = "camelCase")]
    InsightUpdated { insight: Insight },
    #[serde(rename_all = "camelCase")]
    ChatProgress {
        conversation_id: String,
        phase: ChatPhase,
    },
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(64);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    /// Fire-and-forget emit. A send error only means nobody is listening.
    pub fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
