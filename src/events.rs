//! Broadcast channel for UI-facing events (forwarded over `/ws`).

use serde::Serialize;
use tokio::sync::broadcast;

/// Lifecycle of a submitted transaction.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed,
}

impl TxStatus {
    fn event_type(self) -> &'static str {
        match self {
            TxStatus::Pending => "tx:pending",
            TxStatus::Confirmed => "tx:confirmed",
            TxStatus::Failed => "tx:failed",
        }
    }
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<String>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    /// Send a JSON event; having no subscribers is not an error.
    pub fn emit(&self, event: serde_json::Value) {
        let _ = self.tx.send(event.to_string());
    }

    pub fn emit_tx(&self, status: TxStatus, method: &str, hash: Option<&str>, error: Option<&str>) {
        let mut event = serde_json::json!({
            "type": status.event_type(),
            "status": status,
            "method": method,
        });
        if let Some(h) = hash {
            event["transactionHash"] = serde_json::Value::String(h.to_string());
        }
        if let Some(e) = error {
            event["error"] = serde_json::Value::String(e.to_string());
        }
        self.emit(event);
    }
}
