use async_trait::async_trait;
use sea_orm::DatabaseTransaction;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{batch_stock, lock_batch, BatchChange};
use crate::commands::Command;
use crate::entities::MovementType;
use crate::errors::ServiceError;
use crate::ledger::movement_ledger::{self, NewMovement};
use crate::ledger::{batch_store, require_reason, stock_aggregator};

/// Hard-deletes a batch after writing the movement that debits whatever it
/// still held.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteBatchCommand {
    pub batch_id: i64,
    pub reason: String,
    pub performed_by: Option<Uuid>,
}

#[async_trait]
impl Command for DeleteBatchCommand {
    type Result = BatchChange;
    const NAME: &'static str = "delete_batch";

    fn validate_input(&self) -> Result<(), ServiceError> {
        require_reason("reason", Some(&self.reason)).map(|_| ())
    }

    #[instrument(skip(self, txn), fields(batch_id = self.batch_id))]
    async fn execute(&self, txn: &DatabaseTransaction) -> Result<Self::Result, ServiceError> {
        let reason = require_reason("reason", Some(&self.reason))?;
        let (inventory, batch) = lock_batch(txn, self.batch_id).await?;

        let removed = if batch.is_live() { batch.quantity } else { 0 };
        let previous_stock = batch_stock(txn, &inventory).await?;

        // The ledger entry goes in while the row still exists
        let movement = movement_ledger::record(
            txn,
            NewMovement::new(
                inventory.id,
                MovementType::Adjustment,
                previous_stock,
                previous_stock - removed,
            )
            .batch(batch.id)
            .user(self.performed_by)
            .reason(Some(reason))
            .reference(Some(format!("delete-batch:{}", batch.id)))
            .supplier(batch.supplier_name.clone())
            .cost(batch.cost_price),
        )
        .await?;

        batch_store::delete_batch(txn, batch.id).await?;
        let inventory = stock_aggregator::recompute(txn, inventory).await?;

        info!(
            batch_id = batch.id,
            removed,
            new_stock = inventory.current_stock,
            "Batch deleted"
        );
        Ok(BatchChange {
            batch_id: batch.id,
            product_id: batch.product_id,
            movement_id: movement.id,
            old_quantity: batch.quantity,
            new_quantity: 0,
            new_stock: inventory.current_stock,
        })
    }
}
