use crate::{
    commands::{
        self,
        inventory::{
            AdjustStockCommand, AdjustmentResult, BatchRestockCommand, DeductForSaleCommand,
            ReconcileProductCommand, ReconcileReport, RestockCommand, RestockResult,
            SetReorderLevelCommand,
        },
    },
    entities::{
        inventory::{self, Entity as Inventory},
        inventory_batch::{self, BatchStatus, Entity as InventoryBatch},
        product::{self, Entity as Product},
        stock_movement,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    ledger::{movement_ledger, DeductionResult, MovementFilter},
    services::LedgerSettings,
};
use chrono::{Duration, NaiveDate, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// A product whose aggregate stock is at or below its reorder level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAlert {
    pub product_id: Uuid,
    pub barcode: String,
    pub name: String,
    pub current_stock: i32,
    pub reorder_level: i32,
}

impl StockAlert {
    fn new(product: &product::Model, inventory: &inventory::Model) -> Self {
        Self {
            product_id: product.id,
            barcode: product.barcode.clone(),
            name: product.label(),
            current_stock: inventory.current_stock,
            reorder_level: inventory.reorder_level,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiringBatch {
    pub batch_id: i64,
    pub product_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub expiry_date: NaiveDate,
    /// Negative once the batch has expired.
    pub days_left: i64,
    pub expired: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryAlerts {
    pub out_of_stock: Vec<StockAlert>,
    pub low_stock: Vec<StockAlert>,
    pub expiring_soon: Vec<ExpiringBatch>,
}

/// Service for stock levels, restocks, adjustments and the movement ledger
#[derive(Clone)]
pub struct InventoryService {
    db_pool: Arc<DatabaseConnection>,
    event_sender: EventSender,
    settings: LedgerSettings,
}

impl InventoryService {
    /// Creates a new inventory service instance
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

    /// Receives one delivery of a product as a new batch
    #[instrument(skip(self))]
    pub async fn restock(&self, command: RestockCommand) -> Result<RestockResult, ServiceError> {
        let result =
            commands::execute(&self.db_pool, self.settings.retry_policy, &command).await?;

        self.event_sender
            .publish_committed(vec![
                Event::invalidate_all(),
                Event::StockRestocked {
                    product_id: result.product_id,
                    batch_id: Some(result.batch_id),
                    quantity: command.quantity,
                    new_stock: result.new_stock,
                },
            ])
            .await;
        Ok(result)
    }

    /// Receives a multi-product delivery in one unit of work
    #[instrument(skip(self), fields(items = command.items.len()))]
    pub async fn batch_restock(
        &self,
        command: BatchRestockCommand,
    ) -> Result<Vec<RestockResult>, ServiceError> {
        let results =
            commands::execute(&self.db_pool, self.settings.retry_policy, &command).await?;

        let mut events = vec![Event::invalidate_all()];
        events.extend(results.iter().zip(&command.items).map(|(result, item)| {
            Event::StockRestocked {
                product_id: result.product_id,
                batch_id: Some(result.batch_id),
                quantity: item.quantity,
                new_stock: result.new_stock,
            }
        }));
        self.event_sender.publish_committed(events).await;

        info!(items = results.len(), "Batch restock committed");
        Ok(results)
    }

    /// Applies an operator correction (adjustment, damage, return, internal use)
    #[instrument(skip(self))]
    pub async fn adjust_stock(
        &self,
        command: AdjustStockCommand,
    ) -> Result<AdjustmentResult, ServiceError> {
        let result =
            commands::execute(&self.db_pool, self.settings.retry_policy, &command).await?;

        self.event_sender
            .publish_committed(vec![
                Event::invalidate_all(),
                Event::StockAdjusted {
                    product_id: result.product_id,
                    movement_type: command.movement_type,
                    quantity_change: command.quantity_change,
                    new_stock: result.new_stock,
                },
            ])
            .await;
        Ok(result)
    }

    /// Deducts stock for one sale line in its own unit of work. Failures come
    /// back inside the result rather than as an error.
    #[instrument(skip(self))]
    pub async fn deduct_for_sale(
        &self,
        product_id: Uuid,
        quantity: i32,
        performed_by: Option<Uuid>,
    ) -> DeductionResult {
        let command = DeductForSaleCommand {
            product_id,
            quantity,
            reference: None,
            performed_by,
        };
        let outcome = commands::execute(&self.db_pool, self.settings.retry_policy, &command).await;

        if let Ok(deduction) = &outcome {
            self.event_sender
                .publish_committed(vec![
                    Event::invalidate_all(),
                    Event::StockDeducted {
                        product_id,
                        quantity: deduction.quantity,
                        new_stock: deduction.new_stock,
                    },
                ])
                .await;
        }
        DeductionResult::from(&outcome)
    }

    /// Most recent movements of a product, newest first
    #[instrument(skip(self))]
    pub async fn get_movements(
        &self,
        product_id: Uuid,
        limit: u64,
    ) -> Result<Vec<stock_movement::Model>, ServiceError> {
        let max = self.settings.movement_query_max_limit;
        if limit == 0 || limit > max {
            return Err(ServiceError::validation(
                "limit",
                format!("must be between 1 and {}", max),
            ));
        }
        let inventory = self.get_inventory(product_id).await?;
        movement_ledger::recent_for_inventory(&*self.db_pool, inventory.id, limit).await
    }

    /// Filtered, paginated audit query over every movement
    #[instrument(skip(self))]
    pub async fn get_all_movements(
        &self,
        filter: MovementFilter,
    ) -> Result<(Vec<stock_movement::Model>, u64), ServiceError> {
        if filter.limit > self.settings.movement_query_max_limit {
            return Err(ServiceError::validation(
                "limit",
                format!("must not exceed {}", self.settings.movement_query_max_limit),
            ));
        }
        movement_ledger::search(&*self.db_pool, &filter).await
    }

    /// Aggregate stock row of a product
    #[instrument(skip(self))]
    pub async fn get_inventory(&self, product_id: Uuid) -> Result<inventory::Model, ServiceError> {
        Inventory::find()
            .filter(inventory::Column::ProductId.eq(product_id))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Inventory for product {} not found", product_id))
            })
    }

    /// Out-of-stock and low-stock products plus live batches close to expiry
    #[instrument(skip(self))]
    pub async fn get_inventory_alerts(&self) -> Result<InventoryAlerts, ServiceError> {
        let today = Utc::now().date_naive();
        self.inventory_alerts_on(today).await
    }

    /// Same as [`Self::get_inventory_alerts`] with an explicit "today".
    pub async fn inventory_alerts_on(&self, today: NaiveDate) -> Result<InventoryAlerts, ServiceError> {
        let db = &*self.db_pool;
        let mut alerts = InventoryAlerts::default();

        let rows = Inventory::find()
            .find_also_related(Product)
            .order_by_asc(inventory::Column::CurrentStock)
            .all(db)
            .await?;
        for (inventory, product) in rows {
            let Some(product) = product else { continue };
            if inventory.is_out_of_stock() {
                alerts.out_of_stock.push(StockAlert::new(&product, &inventory));
            } else if inventory.is_low_stock() {
                alerts.low_stock.push(StockAlert::new(&product, &inventory));
            }
        }

        let cutoff = expiry_cutoff(today, self.settings.expiry_warning_days);
        let batches = InventoryBatch::find()
            .filter(inventory_batch::Column::Status.eq(BatchStatus::Active))
            .filter(inventory_batch::Column::Quantity.gt(0))
            .filter(inventory_batch::Column::ExpiryDate.is_not_null())
            .filter(inventory_batch::Column::ExpiryDate.lte(cutoff))
            .order_by_asc(inventory_batch::Column::ExpiryDate)
            .order_by_asc(inventory_batch::Column::Id)
            .find_also_related(Product)
            .all(db)
            .await?;
        for (batch, product) in batches {
            let Some(expiry_date) = batch.expiry_date else { continue };
            let days_left = (expiry_date - today).num_days();
            alerts.expiring_soon.push(ExpiringBatch {
                batch_id: batch.id,
                product_id: batch.product_id,
                name: product.map(|p| p.label()).unwrap_or_default(),
                quantity: batch.quantity,
                expiry_date,
                days_left,
                expired: days_left < 0,
            });
        }

        metrics::gauge!("stockledger.alerts.out_of_stock", alerts.out_of_stock.len() as f64);
        metrics::gauge!("stockledger.alerts.low_stock", alerts.low_stock.len() as f64);
        metrics::gauge!("stockledger.alerts.expiring_soon", alerts.expiring_soon.len() as f64);
        Ok(alerts)
    }

    #[instrument(skip(self))]
    pub async fn set_reorder_level(
        &self,
        command: SetReorderLevelCommand,
    ) -> Result<inventory::Model, ServiceError> {
        let inventory =
            commands::execute(&self.db_pool, self.settings.retry_policy, &command).await?;

        self.event_sender
            .publish_committed(vec![
                Event::invalidate_all(),
                Event::ReorderLevelChanged {
                    product_id: inventory.product_id,
                    reorder_level: inventory.reorder_level,
                },
            ])
            .await;
        Ok(inventory)
    }

    /// Recomputes a product's aggregate from its batches and reports drift
    #[instrument(skip(self))]
    pub async fn reconcile_product(&self, product_id: Uuid) -> Result<ReconcileReport, ServiceError> {
        let command = ReconcileProductCommand { product_id };
        let report = commands::execute(&self.db_pool, self.settings.retry_policy, &command).await?;

        if report.drifted {
            self.event_sender
                .publish_committed(vec![
                    Event::invalidate_all(),
                    Event::AggregateReconciled {
                        product_id,
                        previous_stock: report.previous_stock,
                        current_stock: report.current_stock,
                    },
                ])
                .await;
        }
        Ok(report)
    }
}

/// Last expiry date inside the warning window. Windows past the calendar
/// saturate, and the result stays within four-digit years so it compares
/// correctly against dates stored as text.
fn expiry_cutoff(today: NaiveDate, warning_days: i64) -> NaiveDate {
    let earliest = NaiveDate::from_ymd_opt(1, 1, 1).unwrap_or(NaiveDate::MIN);
    let latest = NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX);
    Duration::try_days(warning_days)
        .and_then(|window| today.checked_add_signed(window))
        .unwrap_or(if warning_days < 0 { earliest } else { latest })
        .clamp(earliest, latest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn expiry_cutoff_saturates_instead_of_panicking() {
        let today = date(2026, 10, 16);
        assert_eq!(expiry_cutoff(today, 30), date(2026, 11, 15));
        assert_eq!(expiry_cutoff(today, 0), today);
        assert_eq!(expiry_cutoff(today, i64::MAX), date(9999, 12, 31));
        assert_eq!(expiry_cutoff(today, 100_000_000), date(9999, 12, 31));
        assert_eq!(expiry_cutoff(today, i64::MIN), date(1, 1, 1));
    }
}
