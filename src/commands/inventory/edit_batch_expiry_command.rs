use async_trait::async_trait;
use chrono::NaiveDate;
use sea_orm::DatabaseTransaction;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{lock_batch, reject_terminal, BatchChange};
use crate::commands::Command;
use crate::entities::MovementType;
use crate::errors::ServiceError;
use crate::ledger::movement_ledger::{self, NewMovement};
use crate::ledger::{batch_store, require_reason, stock_aggregator};

/// Re-dates a batch. Quantity is untouched, but FEFO order may change, so the
/// edit is still written to the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditBatchExpiryCommand {
    pub batch_id: i64,
    /// `None` marks the batch as never expiring.
    pub expiry_date: Option<NaiveDate>,
    pub reason: String,
    pub performed_by: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryChange {
    #[serde(flatten)]
    pub change: BatchChange,
    pub old_expiry: Option<NaiveDate>,
    pub new_expiry: Option<NaiveDate>,
}

fn describe(date: Option<NaiveDate>) -> String {
    date.map_or_else(|| "none".to_string(), |d| d.to_string())
}

#[async_trait]
impl Command for EditBatchExpiryCommand {
    type Result = ExpiryChange;
    const NAME: &'static str = "edit_batch_expiry";

    fn validate_input(&self) -> Result<(), ServiceError> {
        require_reason("reason", Some(&self.reason)).map(|_| ())
    }

    #[instrument(skip(self, txn), fields(batch_id = self.batch_id, expiry = ?self.expiry_date))]
    async fn execute(&self, txn: &DatabaseTransaction) -> Result<Self::Result, ServiceError> {
        let reason = require_reason("reason", Some(&self.reason))?;
        let (inventory, batch) = lock_batch(txn, self.batch_id).await?;
        reject_terminal(&batch)?;

        let old_expiry = batch.expiry_date;
        let quantity = batch.quantity;
        let batch = batch_store::set_expiry(txn, batch, self.expiry_date).await?;
        let inventory = stock_aggregator::recompute(txn, inventory).await?;

        let movement = movement_ledger::record(
            txn,
            NewMovement::new(
                inventory.id,
                MovementType::Adjustment,
                inventory.current_stock,
                inventory.current_stock,
            )
            .batch(batch.id)
            .user(self.performed_by)
            .reason(Some(reason))
            .reference(Some(format!(
                "expiry:{}->{}",
                describe(old_expiry),
                describe(self.expiry_date)
            )))
            .cost(batch.cost_price),
        )
        .await?;

        info!(
            batch_id = batch.id,
            old_expiry = ?old_expiry,
            new_expiry = ?batch.expiry_date,
            "Batch expiry edited"
        );
        Ok(ExpiryChange {
            change: BatchChange {
                batch_id: batch.id,
                product_id: batch.product_id,
                movement_id: movement.id,
                old_quantity: quantity,
                new_quantity: quantity,
                new_stock: inventory.current_stock,
            },
            old_expiry,
            new_expiry: batch.expiry_date,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_reference_shows_both_dates() {
        let d = NaiveDate::from_ymd_opt(2025, 2, 28);
        assert_eq!(
            format!("expiry:{}->{}", describe(d), describe(None)),
            "expiry:2025-02-28->none"
        );
    }

    #[test]
    fn reason_is_required() {
        let cmd = EditBatchExpiryCommand {
            batch_id: 1,
            expiry_date: None,
            reason: "".into(),
            performed_by: None,
        };
        assert!(cmd.validate_input().is_err());
    }
}
