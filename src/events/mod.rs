use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::entities::MovementType;

/// Downstream views that must refresh after inventory changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CacheScope {
    Inventory,
    VendorCatalog,
    Dashboard,
}

impl CacheScope {
    pub const ALL: [CacheScope; 3] = [
        CacheScope::Inventory,
        CacheScope::VendorCatalog,
        CacheScope::Dashboard,
    ];
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Creates a sender together with its receiving end.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Publishes events for work that has already committed. Delivery problems
    /// are logged only; the committed rows stay as they are.
    pub async fn publish_committed(&self, events: Vec<Event>) {
        for event in events {
            let name = event.name();
            if let Err(e) = self.send(event).await {
                warn!(event = name, error = %e, "Dropped post-commit event");
                metrics::counter!("stockledger.events.dropped", 1);
            }
        }
    }
}

/// Domain events emitted after a committed unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    CacheInvalidated {
        scopes: Vec<CacheScope>,
    },
    ProductRegistered {
        product_id: Uuid,
        opening_stock: i32,
    },
    StockRestocked {
        product_id: Uuid,
        batch_id: Option<i64>,
        quantity: i32,
        new_stock: i32,
    },
    StockAdjusted {
        product_id: Uuid,
        movement_type: MovementType,
        quantity_change: i32,
        new_stock: i32,
    },
    StockDeducted {
        product_id: Uuid,
        quantity: i32,
        new_stock: i32,
    },
    SaleSettled {
        sale_id: Uuid,
        receipt_number: String,
        total: Decimal,
        settled_at: DateTime<Utc>,
    },
    BatchAdjusted {
        batch_id: i64,
        product_id: Uuid,
        old_quantity: i32,
        new_quantity: i32,
    },
    BatchExpiryEdited {
        batch_id: i64,
        product_id: Uuid,
        old_expiry: Option<NaiveDate>,
        new_expiry: Option<NaiveDate>,
    },
    BatchDeleted {
        batch_id: i64,
        product_id: Uuid,
        removed_quantity: i32,
    },
    BatchReturnedToSupplier {
        batch_id: i64,
        product_id: Uuid,
        quantity: i32,
        fully_returned: bool,
    },
    ReorderLevelChanged {
        product_id: Uuid,
        reorder_level: i32,
    },
    AggregateReconciled {
        product_id: Uuid,
        previous_stock: i32,
        current_stock: i32,
    },
}

impl Event {
    /// Cache invalidation signal fired after every mutating call.
    pub fn invalidate_all() -> Self {
        Event::CacheInvalidated {
            scopes: CacheScope::ALL.to_vec(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Event::CacheInvalidated { .. } => "cache_invalidated",
            Event::ProductRegistered { .. } => "product_registered",
            Event::StockRestocked { .. } => "stock_restocked",
            Event::StockAdjusted { .. } => "stock_adjusted",
            Event::StockDeducted { .. } => "stock_deducted",
            Event::SaleSettled { .. } => "sale_settled",
            Event::BatchAdjusted { .. } => "batch_adjusted",
            Event::BatchExpiryEdited { .. } => "batch_expiry_edited",
            Event::BatchDeleted { .. } => "batch_deleted",
            Event::BatchReturnedToSupplier { .. } => "batch_returned_to_supplier",
            Event::ReorderLevelChanged { .. } => "reorder_level_changed",
            Event::AggregateReconciled { .. } => "aggregate_reconciled",
        }
    }
}

/// Default consumer: logs every event until all senders are dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::CacheInvalidated { scopes } => {
                debug!(?scopes, "Cache invalidation requested");
            }
            Event::SaleSettled {
                sale_id,
                receipt_number,
                total,
                ..
            } => {
                info!(%sale_id, %receipt_number, %total, "Sale settled");
            }
            other => {
                info!(event = other.name(), payload = ?other, "Inventory event");
            }
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_committed_survives_closed_channel() {
        let (sender, rx) = EventSender::channel(4);
        drop(rx);
        // Must not panic or error
        sender
            .publish_committed(vec![Event::invalidate_all()])
            .await;
    }

    #[tokio::test]
    async fn events_arrive_in_order() {
        let (sender, mut rx) = EventSender::channel(4);
        sender
            .publish_committed(vec![
                Event::StockDeducted {
                    product_id: Uuid::nil(),
                    quantity: 2,
                    new_stock: 8,
                },
                Event::invalidate_all(),
            ])
            .await;

        assert_eq!(rx.recv().await.map(|e| e.name()), Some("stock_deducted"));
        match rx.recv().await {
            Some(Event::CacheInvalidated { scopes }) => assert_eq!(scopes.len(), 3),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
