pub mod adjust_batch_quantity_command;
pub mod adjust_stock_command;
pub mod batch_restock_command;
pub mod deduct_for_sale_command;
pub mod delete_batch_command;
pub mod edit_batch_expiry_command;
pub mod reconcile_product_command;
pub mod restock_command;
pub mod return_batch_to_supplier_command;
pub mod set_reorder_level_command;

pub use adjust_batch_quantity_command::{AdjustBatchQuantityCommand, BatchChange};
pub use adjust_stock_command::{AdjustStockCommand, AdjustmentResult};
pub use batch_restock_command::{BatchRestockCommand, BatchRestockItem};
pub use deduct_for_sale_command::DeductForSaleCommand;
pub use delete_batch_command::DeleteBatchCommand;
pub use edit_batch_expiry_command::{EditBatchExpiryCommand, ExpiryChange};
pub use reconcile_product_command::{ReconcileProductCommand, ReconcileReport};
pub use restock_command::{RestockCommand, RestockResult};
pub use return_batch_to_supplier_command::{ReturnBatchToSupplierCommand, SupplierReturn};
pub use set_reorder_level_command::SetReorderLevelCommand;

use sea_orm::{ConnectionTrait, EntityTrait};

use crate::entities::inventory_batch::{self, Entity as InventoryBatch};
use crate::entities::inventory;
use crate::errors::ServiceError;
use crate::ledger::{batch_store, stock_aggregator};

/// Locks the aggregate row of the batch's product, then the batch itself.
///
/// Same lock order as a FEFO deduction (aggregate first, batches second) so
/// audit operations and sales on one product cannot deadlock each other.
pub(crate) async fn lock_batch<C: ConnectionTrait>(
    conn: &C,
    batch_id: i64,
) -> Result<(inventory::Model, inventory_batch::Model), ServiceError> {
    let product_id = InventoryBatch::find_by_id(batch_id)
        .one(conn)
        .await?
        .map(|batch| batch.product_id)
        .ok_or_else(|| ServiceError::NotFound(format!("Batch {} not found", batch_id)))?;

    let inventory = stock_aggregator::inventory_for_update(conn, product_id).await?;
    let batch = batch_store::find_batch_for_update(conn, batch_id).await?;
    Ok((inventory, batch))
}

/// Live stock of a batch-tracked product as its batches say it is.
pub(crate) async fn batch_stock<C: ConnectionTrait>(
    conn: &C,
    inventory: &inventory::Model,
) -> Result<i32, ServiceError> {
    let batches = batch_store::batches_for_product(conn, inventory.product_id).await?;
    Ok(stock_aggregator::aggregate(&batches)?.current_stock)
}

pub(crate) fn reject_terminal(batch: &inventory_batch::Model) -> Result<(), ServiceError> {
    if batch.status.is_terminal() {
        return Err(ServiceError::InvalidAdjustment(format!(
            "Batch {} was returned to the supplier and can no longer change",
            batch.id
        )));
    }
    Ok(())
}
