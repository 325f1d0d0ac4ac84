use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseTransaction, Set};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::commands::Command;
use crate::entities::inventory;
use crate::errors::ServiceError;
use crate::ledger::stock_aggregator;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SetReorderLevelCommand {
    pub product_id: Uuid,
    #[validate(range(min = 0))]
    pub reorder_level: i32,
}

#[async_trait]
impl Command for SetReorderLevelCommand {
    type Result = inventory::Model;
    const NAME: &'static str = "set_reorder_level";

    fn validate_input(&self) -> Result<(), ServiceError> {
        Ok(self.validate()?)
    }

    #[instrument(skip(self, txn), fields(product_id = %self.product_id, reorder_level = self.reorder_level))]
    async fn execute(&self, txn: &DatabaseTransaction) -> Result<Self::Result, ServiceError> {
        let inventory = stock_aggregator::inventory_for_update(txn, self.product_id).await?;
        if inventory.reorder_level == self.reorder_level {
            return Ok(inventory);
        }
        let previous = inventory.reorder_level;
        let mut active: inventory::ActiveModel = inventory.into();
        active.reorder_level = Set(self.reorder_level);
        active.updated_at = Set(Utc::now());
        let inventory = active.update(txn).await?;

        info!(previous, reorder_level = inventory.reorder_level, "Reorder level changed");
        Ok(inventory)
    }
}
