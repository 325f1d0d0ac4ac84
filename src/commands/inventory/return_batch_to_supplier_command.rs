use async_trait::async_trait;
use sea_orm::DatabaseTransaction;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{batch_stock, lock_batch, reject_terminal, BatchChange};
use crate::commands::Command;
use crate::entities::MovementType;
use crate::errors::ServiceError;
use crate::ledger::movement_ledger::{self, NewMovement};
use crate::ledger::{batch_store, clean_text, require_reason, stock_aggregator};

/// Sends some or all of a batch back to its supplier.
///
/// Returning everything that is left (the default when `quantity` is `None`)
/// retires the batch as RETURNED_TO_SUPPLIER; a partial return only debits it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnBatchToSupplierCommand {
    pub batch_id: i64,
    pub quantity: Option<i32>,
    pub reason: String,
    /// Defaults to `RET-<supplier reference>`.
    pub reference: Option<String>,
    pub performed_by: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierReturn {
    #[serde(flatten)]
    pub change: BatchChange,
    pub returned_quantity: i32,
    pub fully_returned: bool,
    pub reference: String,
}

#[async_trait]
impl Command for ReturnBatchToSupplierCommand {
    type Result = SupplierReturn;
    const NAME: &'static str = "return_batch_to_supplier";

    fn validate_input(&self) -> Result<(), ServiceError> {
        require_reason("reason", Some(&self.reason))?;
        if matches!(self.quantity, Some(q) if q <= 0) {
            return Err(ServiceError::validation("quantity", "must be greater than zero"));
        }
        Ok(())
    }

    #[instrument(skip(self, txn), fields(batch_id = self.batch_id, quantity = ?self.quantity))]
    async fn execute(&self, txn: &DatabaseTransaction) -> Result<Self::Result, ServiceError> {
        let reason = require_reason("reason", Some(&self.reason))?;
        let (inventory, batch) = lock_batch(txn, self.batch_id).await?;
        reject_terminal(&batch)?;

        let old_quantity = batch.quantity;
        let returned = self.quantity.unwrap_or(old_quantity);
        if returned > old_quantity {
            return Err(ServiceError::InvalidAdjustment(format!(
                "Batch {} holds {} units; cannot return {}",
                batch.id, old_quantity, returned
            )));
        }
        let fully_returned = returned == old_quantity;

        let reference = clean_text(self.reference.as_deref()).unwrap_or_else(|| {
            format!(
                "RET-{}",
                batch
                    .supplier_reference
                    .clone()
                    .unwrap_or_else(|| batch.id.to_string())
            )
        });
        let supplier = batch.supplier_name.clone();
        let cost = batch.cost_price;

        let previous_stock = batch_stock(txn, &inventory).await?;
        let batch = if fully_returned {
            batch_store::mark_returned(txn, batch).await?
        } else {
            batch_store::set_quantity(txn, batch, old_quantity - returned).await?
        };
        let inventory = stock_aggregator::recompute(txn, inventory).await?;

        let movement = movement_ledger::record(
            txn,
            NewMovement::new(
                inventory.id,
                MovementType::SupplierReturn,
                previous_stock,
                inventory.current_stock,
            )
            .batch(batch.id)
            .user(self.performed_by)
            .reason(Some(reason))
            .reference(Some(reference.clone()))
            .supplier(supplier)
            .cost(cost),
        )
        .await?;

        info!(
            batch_id = batch.id,
            returned,
            fully_returned,
            new_stock = inventory.current_stock,
            "Batch returned to supplier"
        );
        Ok(SupplierReturn {
            change: BatchChange {
                batch_id: batch.id,
                product_id: batch.product_id,
                movement_id: movement.id,
                old_quantity,
                new_quantity: batch.quantity,
                new_stock: inventory.current_stock,
            },
            returned_quantity: returned,
            fully_returned,
            reference,
        })
    }
}
