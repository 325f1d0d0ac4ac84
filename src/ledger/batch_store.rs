use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use tracing::debug;
use uuid::Uuid;

use crate::db::transaction::supports_row_locks;
use crate::entities::inventory_batch::{self, BatchStatus, Entity as InventoryBatch};
use crate::errors::ServiceError;
use crate::ledger::fefo;

/// Fields of a batch about to be received.
#[derive(Debug, Clone)]
pub struct NewBatch {
    pub product_id: Uuid,
    pub quantity: i32,
    pub expiry_date: Option<NaiveDate>,
    pub received_date: DateTime<Utc>,
    pub supplier_name: Option<String>,
    pub supplier_reference: Option<String>,
    pub cost_price: Option<Decimal>,
    pub document_reference: Option<String>,
}

pub async fn create_batch<C: ConnectionTrait>(
    conn: &C,
    new: NewBatch,
) -> Result<inventory_batch::Model, ServiceError> {
    if new.quantity <= 0 {
        return Err(ServiceError::validation(
            "quantity",
            "must be greater than zero",
        ));
    }
    let now = Utc::now();
    let batch = inventory_batch::ActiveModel {
        product_id: Set(new.product_id),
        quantity: Set(new.quantity),
        expiry_date: Set(new.expiry_date),
        received_date: Set(new.received_date),
        supplier_name: Set(new.supplier_name),
        supplier_reference: Set(new.supplier_reference),
        cost_price: Set(new.cost_price),
        document_reference: Set(new.document_reference),
        status: Set(BatchStatus::Active),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    debug!(batch_id = batch.id, product_id = %batch.product_id, quantity = batch.quantity, "Batch created");
    Ok(batch)
}

/// Loads one batch, holding its row lock until the transaction ends.
pub async fn find_batch_for_update<C: ConnectionTrait>(
    conn: &C,
    batch_id: i64,
) -> Result<inventory_batch::Model, ServiceError> {
    let mut query = InventoryBatch::find_by_id(batch_id);
    if supports_row_locks(conn) {
        query = query.lock_exclusive();
    }
    query
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Batch {} not found", batch_id)))
}

/// Batches FEFO may draw from, locked and in consumption order.
pub async fn live_batches_for_update<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
) -> Result<Vec<inventory_batch::Model>, ServiceError> {
    let mut query = InventoryBatch::find()
        .filter(inventory_batch::Column::ProductId.eq(product_id))
        .filter(inventory_batch::Column::Status.eq(BatchStatus::Active))
        .filter(inventory_batch::Column::Quantity.gt(0))
        .order_by_asc(inventory_batch::Column::Id);
    if supports_row_locks(conn) {
        query = query.lock_exclusive();
    }
    let mut batches = query.all(conn).await?;
    fefo::sort_fefo(&mut batches);
    Ok(batches)
}

/// Every batch of a product, including depleted and returned ones, in FEFO order.
pub async fn batches_for_product<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
) -> Result<Vec<inventory_batch::Model>, ServiceError> {
    let mut batches = InventoryBatch::find()
        .filter(inventory_batch::Column::ProductId.eq(product_id))
        .all(conn)
        .await?;
    fefo::sort_fefo(&mut batches);
    Ok(batches)
}

/// Writes a new quantity and moves the status between ACTIVE and DEPLETED.
pub async fn set_quantity<C: ConnectionTrait>(
    conn: &C,
    batch: inventory_batch::Model,
    quantity: i32,
) -> Result<inventory_batch::Model, ServiceError> {
    if quantity < 0 {
        return Err(ServiceError::InvalidAdjustment(format!(
            "Batch {} cannot hold a negative quantity ({})",
            batch.id, quantity
        )));
    }
    if batch.status.is_terminal() {
        return Err(ServiceError::InvalidAdjustment(format!(
            "Batch {} was returned to the supplier and can no longer change",
            batch.id
        )));
    }
    let mut active: inventory_batch::ActiveModel = batch.into();
    active.quantity = Set(quantity);
    active.status = Set(BatchStatus::for_quantity(quantity));
    active.updated_at = Set(Utc::now());
    Ok(active.update(conn).await?)
}

pub async fn set_expiry<C: ConnectionTrait>(
    conn: &C,
    batch: inventory_batch::Model,
    expiry_date: Option<NaiveDate>,
) -> Result<inventory_batch::Model, ServiceError> {
    let mut active: inventory_batch::ActiveModel = batch.into();
    active.expiry_date = Set(expiry_date);
    active.updated_at = Set(Utc::now());
    Ok(active.update(conn).await?)
}

/// Terminal transition after the whole remaining quantity went back to the supplier.
pub async fn mark_returned<C: ConnectionTrait>(
    conn: &C,
    batch: inventory_batch::Model,
) -> Result<inventory_batch::Model, ServiceError> {
    let mut active: inventory_batch::ActiveModel = batch.into();
    active.quantity = Set(0);
    active.status = Set(BatchStatus::ReturnedToSupplier);
    active.updated_at = Set(Utc::now());
    Ok(active.update(conn).await?)
}

/// Hard removal. Callers record the compensating movement first.
pub async fn delete_batch<C: ConnectionTrait>(conn: &C, batch_id: i64) -> Result<(), ServiceError> {
    let result = InventoryBatch::delete_by_id(batch_id).exec(conn).await?;
    if result.rows_affected == 0 {
        return Err(ServiceError::NotFound(format!("Batch {} not found", batch_id)));
    }
    Ok(())
}

/// Formats a supplier reference as `<initials>-<YYYYMMDD>-<NNNN>`.
pub fn supplier_reference(supplier_name: &str, received: NaiveDate, batch_id: i64) -> String {
    let initials: String = supplier_name
        .split_whitespace()
        .filter_map(|word| word.chars().find(|c| c.is_alphanumeric()))
        .take(3)
        .flat_map(char::to_uppercase)
        .collect();
    let initials = if initials.is_empty() {
        "SUP".to_string()
    } else {
        initials
    };
    format!(
        "{}-{}-{:04}",
        initials,
        received.format("%Y%m%d"),
        batch_id.rem_euclid(10_000)
    )
}
