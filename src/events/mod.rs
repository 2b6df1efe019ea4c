use async_trait::async_trait;
use axum::response::sse::Event as SseEvent;
use chrono::{DateTime, Utc};
use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::Sector;

pub const INVENTORY_UPDATED: &str = "inventory_updated";
pub const REPORT_FINALIZED: &str = "relatorio_finalized";

/// Notification pushed to every dashboard subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub sector: Sector,
    #[serde(rename = "type")]
    pub event_type: String,
    pub message: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl RealtimeEvent {
    pub fn new(
        sector: Sector,
        event_type: impl Into<String>,
        message: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            sector,
            event_type: event_type.into(),
            message: message.into(),
            data,
        }
    }
}

/// Fan-out handle for realtime events. Cloning shares the channel.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: broadcast::Sender<RealtimeEvent>,
}

impl EventSender {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        info!("Realtime event bus initialized with capacity {}", capacity);
        Self { sender }
    }

    /// Publishes `event`; returns how many subscribers received it.
    /// Having no subscribers is not an error.
    pub fn send(&self, event: RealtimeEvent) -> usize {
        match self.sender.send(event) {
            Ok(count) => {
                debug!("Broadcast event to {} subscribers", count);
                count
            }
            Err(_) => 0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Server-sent events stream for one client.
    pub fn sse_stream(&self) -> impl Stream<Item = Result<SseEvent, Infallible>> {
        BroadcastStream::new(self.subscribe()).filter_map(|result| async move {
            match result {
                Ok(event) => SseEvent::default()
                    .event(event.event_type.clone())
                    .id(event.id.clone())
                    .json_data(&event)
                    .ok()
                    .map(Ok),
                Err(e) => {
                    warn!("SSE client lagged: {:?}", e);
                    None
                }
            }
        })
    }
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle_event(&self, event: &RealtimeEvent) -> Result<(), String>;
}

/// Feeds every received event to each handler until the bus closes.
pub async fn process_events(
    mut rx: broadcast::Receiver<RealtimeEvent>,
    handlers: Vec<Arc<dyn EventHandler>>,
) {
    info!("Starting event processing loop");

    loop {
        match rx.recv().await {
            Ok(event) => {
                debug!(event_id = %event.id, sector = %event.sector, event_type = %event.event_type, "processing event");
                for handler in &handlers {
                    if let Err(e) = handler.handle_event(&event).await {
                        error!(event_id = %event.id, error = %e, "event handler failed");
                    }
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "event processor lagged behind; continuing");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }

    warn!("Event processing loop has ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(AtomicUsize);

    #[async_trait]
    impl EventHandler for Counting {
        async fn handle_event(&self, _event: &RealtimeEvent) -> Result<(), String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn event_serializes_type_field() {
        let event = RealtimeEvent::new(
            Sector::Inventory,
            INVENTORY_UPDATED,
            "NF 1 escaneada na rua A",
            serde_json::json!({"numeroNF": "1"}),
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], INVENTORY_UPDATED);
        assert_eq!(value["sector"], "inventory");
        assert!(value.get("event_type").is_none());
    }

    #[test]
    fn sending_without_subscribers_is_fine() {
        let sender = EventSender::new(4);
        let delivered = sender.send(RealtimeEvent::new(
            Sector::Packing,
            "cart_released",
            "",
            serde_json::Value::Null,
        ));
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn processor_dispatches_until_closed() {
        let sender = EventSender::new(8);
        let counter = Arc::new(Counting(AtomicUsize::new(0)));
        let rx = sender.subscribe();
        let task = tokio::spawn(process_events(rx, vec![counter.clone() as Arc<dyn EventHandler>]));

        for _ in 0..3 {
            sender.send(RealtimeEvent::new(
                Sector::Receiving,
                "nota_recebida",
                "",
                serde_json::Value::Null,
            ));
        }
        drop(sender);
        task.await.unwrap();
        assert_eq!(counter.0.load(Ordering::SeqCst), 3);
    }
}
