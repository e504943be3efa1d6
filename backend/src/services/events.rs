//! Push updates for dashboards watching transfer documents

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use shared::TransferState;

/// What changed on a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransferEventKind {
    Created,
    StateChanged {
        from: TransferState,
        to: TransferState,
    },
    ItemConfirmed {
        item_id: Uuid,
        actual_quantity: i32,
    },
    ItemAdded {
        item_id: Uuid,
        duplicate_code: bool,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferEvent {
    pub document_id: Uuid,
    pub document_number: String,
    #[serde(flatten)]
    pub kind: TransferEventKind,
    pub at: DateTime<Utc>,
}

impl TransferEvent {
    pub fn new(document_id: Uuid, document_number: impl Into<String>, kind: TransferEventKind) -> Self {
        Self {
            document_id,
            document_number: document_number.into(),
            kind,
            at: Utc::now(),
        }
    }
}

/// Fan-out of document changes. Slow subscribers lose old events instead of
/// blocking writers.
#[derive(Clone)]
pub struct TransferEvents {
    sender: broadcast::Sender<TransferEvent>,
}

impl TransferEvents {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Never fails; with no subscriber the event is dropped
    pub fn publish(&self, event: TransferEvent) {
        match self.sender.send(event) {
            Ok(receivers) => tracing::trace!(receivers, "Transfer event published"),
            Err(_) => tracing::trace!("Transfer event dropped, no subscribers"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransferEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_published_event() {
        let events = TransferEvents::new(8);
        let mut rx = events.subscribe();

        let id = Uuid::new_v4();
        events.publish(TransferEvent::new(id, "PV-2026-001", TransferEventKind::Created));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.document_id, id);
        assert_eq!(received.kind, TransferEventKind::Created);
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let events = TransferEvents::new(1);
        events.publish(TransferEvent::new(
            Uuid::new_v4(),
            "PV-2026-002",
            TransferEventKind::StateChanged {
                from: TransferState::New,
                to: TransferState::Picking,
            },
        ));
    }

    #[test]
    fn test_late_subscriber_misses_earlier_events() {
        let events = TransferEvents::new(4);
        events.publish(TransferEvent::new(Uuid::new_v4(), "PV-2026-001", TransferEventKind::Created));

        let mut rx = events.subscribe();
        events.publish(TransferEvent::new(Uuid::new_v4(), "PV-2026-002", TransferEventKind::Created));

        let received = tokio_test::block_on(rx.recv()).unwrap();
        assert_eq!(received.document_number, "PV-2026-002");
    }

    #[tokio::test]
    async fn test_lagging_subscriber_skips_old_events() {
        let events = TransferEvents::new(2);
        let mut rx = events.subscribe();
        for n in 0..4 {
            events.publish(TransferEvent::new(
                Uuid::new_v4(),
                format!("PV-2026-{n:03}"),
                TransferEventKind::Created,
            ));
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(2))
        ));
        assert_eq!(rx.recv().await.unwrap().document_number, "PV-2026-002");
    }

    #[test]
    fn test_event_serializes_flat() {
        let event = TransferEvent::new(
            Uuid::nil(),
            "PV-2026-009",
            TransferEventKind::ItemAdded {
                item_id: Uuid::nil(),
                duplicate_code: true,
            },
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "item_added");
        assert_eq!(json["duplicate_code"], true);
    }
}
