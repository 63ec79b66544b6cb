use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

pub const STOCK_UPDATE: &str = "stock.update";
pub const ORDER_STATUS: &str = "order.status";

/// Outbound realtime event seam. Delivery is best-effort and
/// fire-and-forget: `emit` never fails and callers never wait on it, so a
/// slow or absent subscriber cannot roll back a committed transaction.
#[cfg_attr(test, mockall::automock)]
pub trait NotificationSink: Send + Sync {
    fn emit(&self, event: &str, payload: Value);
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub event: String,
    pub payload: Value,
}

/// Fans events out on a tokio broadcast channel; the realtime transport
/// subscribes on its side. A send with no subscribers is fine.
pub struct BroadcastSink {
    tx: broadcast::Sender<Notification>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

impl NotificationSink for BroadcastSink {
    fn emit(&self, event: &str, payload: Value) {
        debug!(event, %payload, "emitting notification");
        let _ = self.tx.send(Notification {
            event: event.to_string(),
            payload,
        });
    }
}
