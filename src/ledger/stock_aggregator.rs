use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::transaction::supports_row_locks;
use crate::entities::inventory::{self, Entity as Inventory};
use crate::entities::inventory_batch;
use crate::errors::ServiceError;
use crate::ledger::batch_store;

/// The derived per-product projection of batch state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StockAggregate {
    pub current_stock: i32,
    pub nearest_expiry_date: Option<NaiveDate>,
}

/// Sum of live quantities and the earliest expiry among them.
///
/// A total that does not fit the stock counter is an
/// [`ServiceError::InvalidAdjustment`].
pub fn aggregate(batches: &[inventory_batch::Model]) -> Result<StockAggregate, ServiceError> {
    batches
        .iter()
        .filter(|batch| batch.is_live())
        .try_fold(StockAggregate::default(), |acc, batch| {
            let current_stock = acc.current_stock.checked_add(batch.quantity).ok_or_else(|| {
                ServiceError::InvalidAdjustment(format!(
                    "Stock of product {} would exceed {} units",
                    batch.product_id,
                    i32::MAX
                ))
            })?;
            Ok(StockAggregate {
                current_stock,
                nearest_expiry_date: match (acc.nearest_expiry_date, batch.expiry_date) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                },
            })
        })
}

/// Loads the aggregate row of a product, holding its row lock.
pub async fn inventory_for_update<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
) -> Result<inventory::Model, ServiceError> {
    let mut query = Inventory::find().filter(inventory::Column::ProductId.eq(product_id));
    if supports_row_locks(conn) {
        query = query.lock_exclusive();
    }
    query.one(conn).await?.ok_or_else(|| {
        ServiceError::NotFound(format!("Inventory for product {} not found", product_id))
    })
}

/// Rewrites the aggregate of a batch-tracked product from its batches.
/// Safe to call any number of times.
pub async fn recompute<C: ConnectionTrait>(
    conn: &C,
    inventory: inventory::Model,
) -> Result<inventory::Model, ServiceError> {
    if !inventory.batch_tracked {
        return Err(ServiceError::InternalError(format!(
            "Inventory {} is not batch tracked and cannot be recomputed from batches",
            inventory.id
        )));
    }
    let batches = batch_store::batches_for_product(conn, inventory.product_id).await?;
    let computed = aggregate(&batches)?;

    if computed.current_stock == inventory.current_stock
        && computed.nearest_expiry_date == inventory.nearest_expiry_date
    {
        return Ok(inventory);
    }

    debug!(
        product_id = %inventory.product_id,
        previous_stock = inventory.current_stock,
        current_stock = computed.current_stock,
        nearest_expiry = ?computed.nearest_expiry_date,
        "Aggregate recomputed"
    );
    let mut active: inventory::ActiveModel = inventory.into();
    active.current_stock = Set(computed.current_stock);
    active.nearest_expiry_date = Set(computed.nearest_expiry_date);
    active.updated_at = Set(Utc::now());
    Ok(active.update(conn).await?)
}

/// Switches a product to batch tracking. Returns the positive legacy counter
/// that has to be carried into an opening batch, if any.
pub async fn convert_to_batch_tracking<C: ConnectionTrait>(
    conn: &C,
    inventory: inventory::Model,
) -> Result<(inventory::Model, Option<i32>), ServiceError> {
    if inventory.batch_tracked {
        return Ok((inventory, None));
    }
    let carried = Some(inventory.current_stock).filter(|stock| *stock > 0);
    let mut active: inventory::ActiveModel = inventory.into();
    active.batch_tracked = Set(true);
    active.updated_at = Set(Utc::now());
    Ok((active.update(conn).await?, carried))
}

/// Direct counter change for products that never had a batch.
///
/// Rejects batch-tracked products outright; a result below zero is an
/// [`ServiceError::InvalidAdjustment`].
pub async fn legacy_adjust<C: ConnectionTrait>(
    conn: &C,
    inventory: inventory::Model,
    delta: i32,
) -> Result<inventory::Model, ServiceError> {
    if inventory.batch_tracked {
        return Err(ServiceError::InternalError(format!(
            "Legacy counter path invoked for batch-tracked inventory {}",
            inventory.id
        )));
    }
    let new_stock = inventory.current_stock.checked_add(delta).ok_or_else(|| {
        ServiceError::InvalidAdjustment(format!("Stock change of {} overflows", delta))
    })?;
    if new_stock < 0 {
        warn!(
            product_id = %inventory.product_id,
            current_stock = inventory.current_stock,
            delta,
            "Rejected legacy change below zero"
        );
        return Err(ServiceError::InvalidAdjustment(format!(
            "Stock cannot drop below zero (current {}, change {})",
            inventory.current_stock, delta
        )));
    }

    let mut active: inventory::ActiveModel = inventory.into();
    active.current_stock = Set(new_stock);
    active.updated_at = Set(Utc::now());
    Ok(active.update(conn).await?)
}
