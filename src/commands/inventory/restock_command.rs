use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectionTrait, DatabaseTransaction, Set};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::commands::products::{find_product, validate_money};
use crate::commands::Command;
use crate::entities::{inventory, product, MovementType};
use crate::errors::ServiceError;
use crate::ledger::batch_store::{self, NewBatch};
use crate::ledger::movement_ledger::{self, NewMovement};
use crate::ledger::{clean_text, stock_aggregator};

/// Reference stamped on the batch that carries a legacy counter into batch tracking.
pub const OPENING_BALANCE_REFERENCE: &str = "OPENING-BALANCE";

/// Receives one delivery of a product as a new batch.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RestockCommand {
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
    pub expiry_date: Option<NaiveDate>,
    pub supplier_name: Option<String>,
    /// Invoice or delivery receipt number.
    pub reference: Option<String>,
    /// Unit cost of this delivery; also becomes the product's cost price.
    #[validate(custom = "validate_money")]
    pub cost_price: Option<Decimal>,
    pub reason: Option<String>,
    pub receipt_image: Option<String>,
    pub performed_by: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestockResult {
    pub product_id: Uuid,
    pub movement_id: Uuid,
    pub batch_id: i64,
    pub new_stock: i32,
}

/// Delivery-wide fields shared by every line of a restock.
#[derive(Debug, Clone, Default)]
pub(crate) struct DeliveryHeader {
    pub supplier_name: Option<String>,
    pub reference: Option<String>,
    pub reason: Option<String>,
    pub receipt_image: Option<String>,
    pub performed_by: Option<Uuid>,
}

/// One product line of a delivery.
#[derive(Debug, Clone)]
pub(crate) struct DeliveryLine {
    pub product_id: Uuid,
    pub quantity: i32,
    pub expiry_date: Option<NaiveDate>,
    pub cost_price: Option<Decimal>,
}

#[async_trait]
impl Command for RestockCommand {
    type Result = RestockResult;
    const NAME: &'static str = "restock";

    fn validate_input(&self) -> Result<(), ServiceError> {
        Ok(self.validate()?)
    }

    #[instrument(skip(self, txn), fields(product_id = %self.product_id, quantity = self.quantity))]
    async fn execute(&self, txn: &DatabaseTransaction) -> Result<Self::Result, ServiceError> {
        let header = DeliveryHeader {
            supplier_name: clean_text(self.supplier_name.as_deref()),
            reference: clean_text(self.reference.as_deref()),
            reason: clean_text(self.reason.as_deref()),
            receipt_image: clean_text(self.receipt_image.as_deref()),
            performed_by: self.performed_by,
        };
        let line = DeliveryLine {
            product_id: self.product_id,
            quantity: self.quantity,
            expiry_date: self.expiry_date,
            cost_price: self.cost_price,
        };
        receive(txn, &header, &line).await
    }
}

/// Books one delivery line: opens the batch, refreshes the aggregate and
/// appends the RESTOCK (or INITIAL_STOCK) movement.
pub(crate) async fn receive<C: ConnectionTrait>(
    conn: &C,
    header: &DeliveryHeader,
    line: &DeliveryLine,
) -> Result<RestockResult, ServiceError> {
    let product = find_product(conn, line.product_id).await?;
    let inventory = stock_aggregator::inventory_for_update(conn, product.id).await?;
    let first_stock = !movement_ledger::has_movements(conn, inventory.id).await?;

    let inventory = carry_legacy_counter(conn, &product, inventory, header.performed_by).await?;
    let previous_stock = inventory.current_stock;

    let now = Utc::now();
    let batch = batch_store::create_batch(
        conn,
        NewBatch {
            product_id: product.id,
            quantity: line.quantity,
            expiry_date: line.expiry_date,
            received_date: now,
            supplier_name: header.supplier_name.clone(),
            supplier_reference: header.reference.clone(),
            cost_price: line.cost_price,
            document_reference: header.reference.clone(),
        },
    )
    .await?;

    let batch = match (&header.supplier_name, &batch.supplier_reference) {
        (Some(supplier), None) => {
            let generated = batch_store::supplier_reference(supplier, now.date_naive(), batch.id);
            let mut active: crate::entities::inventory_batch::ActiveModel = batch.into();
            active.supplier_reference = Set(Some(generated));
            active.update(conn).await?
        }
        _ => batch,
    };

    if let Some(cost) = line.cost_price {
        if cost != product.cost_price {
            let mut active: product::ActiveModel = product.clone().into();
            active.cost_price = Set(cost);
            active.updated_at = Set(now);
            active.update(conn).await?;
        }
    }

    let inventory = stock_aggregator::recompute(conn, inventory).await?;
    let mut active: inventory::ActiveModel = inventory.into();
    active.last_restock = Set(Some(now));
    active.updated_at = Set(now);
    let inventory = active.update(conn).await?;

    let movement_type = if first_stock {
        MovementType::InitialStock
    } else {
        MovementType::Restock
    };
    let movement = movement_ledger::record(
        conn,
        NewMovement::new(
            inventory.id,
            movement_type,
            previous_stock,
            inventory.current_stock,
        )
        .batch(batch.id)
        .user(header.performed_by)
        .reason(header.reason.clone())
        .reference(batch.supplier_reference.clone())
        .supplier(header.supplier_name.clone())
        .cost(line.cost_price.or(Some(product.cost_price)))
        .receipt_image(header.receipt_image.clone()),
    )
    .await?;

    info!(
        product_id = %product.id,
        batch_id = batch.id,
        quantity = line.quantity,
        new_stock = inventory.current_stock,
        movement_type = %movement_type,
        "Stock received"
    );

    Ok(RestockResult {
        product_id: product.id,
        movement_id: movement.id,
        batch_id: batch.id,
        new_stock: inventory.current_stock,
    })
}

/// Makes the product batch-tracked. A positive legacy counter moves into an
/// undated opening batch so the aggregate is unchanged by the switch.
pub(crate) async fn carry_legacy_counter<C: ConnectionTrait>(
    conn: &C,
    product: &product::Model,
    inventory: inventory::Model,
    performed_by: Option<Uuid>,
) -> Result<inventory::Model, ServiceError> {
    let (inventory, carried) = stock_aggregator::convert_to_batch_tracking(conn, inventory).await?;
    let Some(quantity) = carried else {
        return Ok(inventory);
    };

    let received = inventory.last_restock.unwrap_or(inventory.created_at);
    let opening = batch_store::create_batch(
        conn,
        NewBatch {
            product_id: product.id,
            quantity,
            expiry_date: None,
            received_date: received,
            supplier_name: None,
            supplier_reference: None,
            cost_price: Some(product.cost_price),
            document_reference: Some(OPENING_BALANCE_REFERENCE.to_string()),
        },
    )
    .await?;

    movement_ledger::record(
        conn,
        NewMovement::new(inventory.id, MovementType::Adjustment, quantity, quantity)
            .batch(opening.id)
            .user(performed_by)
            .reason(Some("Legacy stock carried into batch tracking".to_string()))
            .reference(Some(OPENING_BALANCE_REFERENCE.to_string()))
            .cost(Some(product.cost_price)),
    )
    .await?;

    info!(
        product_id = %product.id,
        batch_id = opening.id,
        quantity,
        "Legacy counter converted to opening batch"
    );
    stock_aggregator::recompute(conn, inventory).await
}
