use crate::{
    commands::{
        self,
        sales::{SaleReceipt, SettleSaleCommand},
    },
    entities::{
        payment::{self, Entity as Payment},
        sale::{self, Entity as Sale},
        sale_item::{self, Entity as SaleItem},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::LedgerSettings,
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// A stored sale with its lines and payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleDetails {
    pub sale: sale::Model,
    pub items: Vec<sale_item::Model>,
    pub payment: Option<payment::Model>,
}

/// Point-of-sale checkout
#[derive(Clone)]
pub struct SalesService {
    db_pool: Arc<DatabaseConnection>,
    event_sender: EventSender,
    settings: LedgerSettings,
}

impl SalesService {
    pub fn new(
        db_pool: Arc<DatabaseConnection>,
        event_sender: EventSender,
        settings: LedgerSettings,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            settings,
        }
    }

    /// Settles a whole sale: every line deducted FEFO, priced and paid, or
    /// nothing at all.
    #[instrument(skip(self), fields(lines = command.items.len()))]
    pub async fn settle_sale(
        &self,
        mut command: SettleSaleCommand,
    ) -> Result<SaleReceipt, ServiceError> {
        command.tax_rate.get_or_insert(self.settings.default_tax_rate);
        let started = std::time::Instant::now();
        let receipt =
            commands::execute(&self.db_pool, self.settings.retry_policy, &command).await?;
        metrics::histogram!("stockledger.sales.settle_duration", started.elapsed());

        let mut events = vec![Event::invalidate_all()];
        events.extend(receipt.deductions.iter().map(|d| Event::StockDeducted {
            product_id: d.product_id,
            quantity: d.quantity,
            new_stock: d.new_stock,
        }));
        events.push(Event::SaleSettled {
            sale_id: receipt.sale.id,
            receipt_number: receipt.sale.receipt_number.clone(),
            total: receipt.sale.total,
            settled_at: receipt.sale.created_at,
        });
        self.event_sender.publish_committed(events).await;

        info!(
            receipt_number = %receipt.sale.receipt_number,
            total = %receipt.sale.total,
            "Checkout complete"
        );
        Ok(receipt)
    }

    #[instrument(skip(self))]
    pub async fn get_sale(&self, sale_id: Uuid) -> Result<SaleDetails, ServiceError> {
        let db = &*self.db_pool;
        let sale = Sale::find_by_id(sale_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Sale {} not found", sale_id)))?;
        let items = sale.find_related(SaleItem).all(db).await?;
        let payment = Payment::find()
            .filter(payment::Column::SaleId.eq(sale.id))
            .one(db)
            .await?;
        Ok(SaleDetails {
            sale,
            items,
            payment,
        })
    }
}
