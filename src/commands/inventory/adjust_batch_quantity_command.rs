use async_trait::async_trait;
use sea_orm::DatabaseTransaction;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{batch_stock, lock_batch, reject_terminal};
use crate::commands::Command;
use crate::entities::stock_movement::{Direction, MovementType};
use crate::errors::ServiceError;
use crate::ledger::movement_ledger::{self, NewMovement};
use crate::ledger::{batch_store, clean_text, require_reason, stock_aggregator};

/// Direct correction of one batch's quantity, e.g. after a shelf count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustBatchQuantityCommand {
    pub batch_id: i64,
    pub quantity_change: i32,
    /// Defaults to ADJUSTMENT; DAMAGE, RETURN and INTERNAL_USE are accepted too.
    pub movement_type: Option<MovementType>,
    pub reason: String,
    pub reference: Option<String>,
    pub performed_by: Option<Uuid>,
}

/// Before/after view of a single-batch operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchChange {
    pub batch_id: i64,
    pub product_id: Uuid,
    pub movement_id: Uuid,
    pub old_quantity: i32,
    pub new_quantity: i32,
    pub new_stock: i32,
}

impl AdjustBatchQuantityCommand {
    fn movement_type(&self) -> MovementType {
        self.movement_type.unwrap_or(MovementType::Adjustment)
    }
}

#[async_trait]
impl Command for AdjustBatchQuantityCommand {
    type Result = BatchChange;
    const NAME: &'static str = "adjust_batch_quantity";

    fn validate_input(&self) -> Result<(), ServiceError> {
        require_reason("reason", Some(&self.reason))?;
        if self.quantity_change == 0 {
            return Err(ServiceError::validation("quantity_change", "must not be zero"));
        }
        let movement_type = self.movement_type();
        if !movement_type.is_manual() {
            return Err(ServiceError::validation(
                "movement_type",
                format!("{} cannot be recorded on a batch by hand", movement_type),
            ));
        }
        let sign_ok = match movement_type.direction() {
            Direction::Inbound => self.quantity_change > 0,
            Direction::Outbound => self.quantity_change < 0,
            Direction::Either => true,
        };
        if !sign_ok {
            return Err(ServiceError::validation(
                "quantity_change",
                format!("has the wrong sign for {} movements", movement_type),
            ));
        }
        Ok(())
    }

    #[instrument(skip(self, txn), fields(batch_id = self.batch_id, change = self.quantity_change))]
    async fn execute(&self, txn: &DatabaseTransaction) -> Result<Self::Result, ServiceError> {
        let reason = require_reason("reason", Some(&self.reason))?;
        let (inventory, batch) = lock_batch(txn, self.batch_id).await?;
        reject_terminal(&batch)?;

        let old_quantity = batch.quantity;
        let new_quantity = old_quantity.checked_add(self.quantity_change).ok_or_else(|| {
            ServiceError::InvalidAdjustment(format!(
                "Change of {} overflows batch {}",
                self.quantity_change, batch.id
            ))
        })?;
        if new_quantity < 0 {
            return Err(ServiceError::InvalidAdjustment(format!(
                "Batch {} holds {} units; removing {} would drop it below zero",
                batch.id, old_quantity, -self.quantity_change
            )));
        }

        let previous_stock = batch_stock(txn, &inventory).await?;
        let cost = batch.cost_price;
        let batch = batch_store::set_quantity(txn, batch, new_quantity).await?;
        let inventory = stock_aggregator::recompute(txn, inventory).await?;

        let movement = movement_ledger::record(
            txn,
            NewMovement::new(
                inventory.id,
                self.movement_type(),
                previous_stock,
                inventory.current_stock,
            )
            .batch(batch.id)
            .user(self.performed_by)
            .reason(Some(reason))
            .reference(clean_text(self.reference.as_deref()))
            .cost(cost),
        )
        .await?;

        info!(
            batch_id = batch.id,
            old_quantity,
            new_quantity,
            status = %batch.status,
            "Batch quantity adjusted"
        );
        Ok(BatchChange {
            batch_id: batch.id,
            product_id: batch.product_id,
            movement_id: movement.id,
            old_quantity,
            new_quantity,
            new_stock: inventory.current_stock,
        })
    }
}
