use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::DatabaseTransaction;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use super::batch_stock;
use crate::commands::products::find_product;
use crate::commands::Command;
use crate::entities::stock_movement::{Direction, MovementType};
use crate::errors::ServiceError;
use crate::ledger::batch_store::{self, NewBatch};
use crate::ledger::fefo::{self, BatchConsumption, MovementContext};
use crate::ledger::movement_ledger::{self, NewMovement};
use crate::ledger::{clean_text, require_reason, stock_aggregator};

/// Operator stock correction on a product as a whole.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustStockCommand {
    pub product_id: Uuid,
    /// Signed change, never zero.
    pub quantity_change: i32,
    pub movement_type: MovementType,
    pub reason: String,
    pub reference: Option<String>,
    /// Expiry of the batch opened by a positive change on a batch-tracked product.
    pub expiry_date: Option<NaiveDate>,
    pub cost_price: Option<Decimal>,
    pub performed_by: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentResult {
    pub product_id: Uuid,
    pub movement_ids: Vec<Uuid>,
    pub batches_used: Vec<BatchConsumption>,
    pub new_stock: i32,
}

impl AdjustStockCommand {
    fn check_direction(&self) -> Result<(), ServiceError> {
        let ok = match self.movement_type.direction() {
            Direction::Inbound => self.quantity_change > 0,
            Direction::Outbound => self.quantity_change < 0,
            Direction::Either => true,
        };
        if ok {
            Ok(())
        } else {
            let expected = if self.quantity_change > 0 {
                "negative"
            } else {
                "positive"
            };
            Err(ServiceError::validation(
                "quantity_change",
                format!("must be {} for {} movements", expected, self.movement_type),
            ))
        }
    }
}

#[async_trait]
impl Command for AdjustStockCommand {
    type Result = AdjustmentResult;
    const NAME: &'static str = "adjust_stock";

    fn validate_input(&self) -> Result<(), ServiceError> {
        if self.quantity_change == 0 {
            return Err(ServiceError::validation("quantity_change", "must not be zero"));
        }
        if !self.movement_type.is_manual() {
            return Err(ServiceError::validation(
                "movement_type",
                format!(
                    "{} is not a manual adjustment type (use ADJUSTMENT, DAMAGE, RETURN or INTERNAL_USE)",
                    self.movement_type
                ),
            ));
        }
        self.check_direction()?;
        require_reason("reason", Some(&self.reason))?;
        if matches!(self.cost_price, Some(cost) if cost < Decimal::ZERO) {
            return Err(ServiceError::validation("cost_price", "must not be negative"));
        }
        Ok(())
    }

    #[instrument(skip(self, txn), fields(product_id = %self.product_id, change = self.quantity_change, movement_type = %self.movement_type))]
    async fn execute(&self, txn: &DatabaseTransaction) -> Result<Self::Result, ServiceError> {
        let reason = require_reason("reason", Some(&self.reason))?;
        let reference = clean_text(self.reference.as_deref());
        let product = find_product(txn, self.product_id).await?;
        let inventory = stock_aggregator::inventory_for_update(txn, product.id).await?;

        // Products that never had a batch keep their plain counter
        if !inventory.batch_tracked {
            let previous_stock = inventory.current_stock;
            let inventory_id = inventory.id;
            let inventory =
                stock_aggregator::legacy_adjust(txn, inventory, self.quantity_change).await?;
            let movement = movement_ledger::record(
                txn,
                NewMovement::new(
                    inventory_id,
                    self.movement_type,
                    previous_stock,
                    inventory.current_stock,
                )
                .user(self.performed_by)
                .reason(Some(reason))
                .reference(reference)
                .cost(self.cost_price.or(Some(product.cost_price))),
            )
            .await?;
            info!(new_stock = inventory.current_stock, "Legacy stock adjusted");
            return Ok(AdjustmentResult {
                product_id: product.id,
                movement_ids: vec![movement.id],
                batches_used: Vec::new(),
                new_stock: inventory.current_stock,
            });
        }

        if self.quantity_change < 0 {
            let ctx = MovementContext {
                movement_type: self.movement_type,
                user_id: self.performed_by,
                reason: Some(reason),
                reference,
            };
            let today = Utc::now().date_naive();
            let deduction = fefo::deduct(txn, &product, -self.quantity_change, &ctx, today)
                .await
                .map_err(|e| match e {
                    ServiceError::InsufficientStock {
                        requested,
                        available,
                        ..
                    } => ServiceError::InvalidAdjustment(format!(
                        "Removing {} units of {} would drop stock below zero (available {})",
                        requested,
                        product.label(),
                        available
                    )),
                    other => other,
                })?;
            info!(new_stock = deduction.new_stock, "Stock adjusted down");
            return Ok(AdjustmentResult {
                product_id: product.id,
                movement_ids: deduction.movement_ids,
                batches_used: deduction.batches_used,
                new_stock: deduction.new_stock,
            });
        }

        // Positive change on a batch-tracked product opens its own batch
        let previous_stock = batch_stock(txn, &inventory).await?;
        let batch = batch_store::create_batch(
            txn,
            NewBatch {
                product_id: product.id,
                quantity: self.quantity_change,
                expiry_date: self.expiry_date,
                received_date: Utc::now(),
                supplier_name: None,
                supplier_reference: None,
                cost_price: self.cost_price.or(Some(product.cost_price)),
                document_reference: reference.clone(),
            },
        )
        .await?;
        let inventory = stock_aggregator::recompute(txn, inventory).await?;
        let movement = movement_ledger::record(
            txn,
            NewMovement::new(
                inventory.id,
                self.movement_type,
                previous_stock,
                inventory.current_stock,
            )
            .batch(batch.id)
            .user(self.performed_by)
            .reason(Some(reason))
            .reference(reference)
            .cost(batch.cost_price),
        )
        .await?;

        info!(batch_id = batch.id, new_stock = inventory.current_stock, "Stock adjusted up");
        Ok(AdjustmentResult {
            product_id: product.id,
            movement_ids: vec![movement.id],
            batches_used: Vec::new(),
            new_stock: inventory.current_stock,
        })
    }
}
