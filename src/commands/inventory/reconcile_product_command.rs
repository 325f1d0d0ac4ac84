use async_trait::async_trait;
use chrono::NaiveDate;
use sea_orm::DatabaseTransaction;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::commands::Command;
use crate::errors::ServiceError;
use crate::ledger::stock_aggregator;

/// Re-runs the stock aggregator for one product and reports drift.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileProductCommand {
    pub product_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub product_id: Uuid,
    pub batch_tracked: bool,
    pub previous_stock: i32,
    pub current_stock: i32,
    pub previous_nearest_expiry: Option<NaiveDate>,
    pub nearest_expiry: Option<NaiveDate>,
    pub drifted: bool,
}

#[async_trait]
impl Command for ReconcileProductCommand {
    type Result = ReconcileReport;
    const NAME: &'static str = "reconcile_product";

    #[instrument(skip(self, txn), fields(product_id = %self.product_id))]
    async fn execute(&self, txn: &DatabaseTransaction) -> Result<Self::Result, ServiceError> {
        let before = stock_aggregator::inventory_for_update(txn, self.product_id).await?;
        let previous_stock = before.current_stock;
        let previous_nearest_expiry = before.nearest_expiry_date;

        // The legacy counter is its own source of truth
        if !before.batch_tracked {
            return Ok(ReconcileReport {
                product_id: self.product_id,
                batch_tracked: false,
                previous_stock,
                current_stock: previous_stock,
                previous_nearest_expiry,
                nearest_expiry: previous_nearest_expiry,
                drifted: false,
            });
        }

        let after = stock_aggregator::recompute(txn, before).await?;
        let drifted = after.current_stock != previous_stock
            || after.nearest_expiry_date != previous_nearest_expiry;
        if drifted {
            metrics::counter!("stockledger.aggregate.drift_corrected", 1);
            warn!(
                previous_stock,
                current_stock = after.current_stock,
                "Aggregate drift corrected"
            );
        }

        Ok(ReconcileReport {
            product_id: self.product_id,
            batch_tracked: true,
            previous_stock,
            current_stock: after.current_stock,
            previous_nearest_expiry,
            nearest_expiry: after.nearest_expiry_date,
            drifted,
        })
    }
}
