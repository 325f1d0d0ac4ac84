use crate::{
    commands::{
        self,
        inventory::{
            AdjustBatchQuantityCommand, BatchChange, DeleteBatchCommand, EditBatchExpiryCommand,
            ExpiryChange, ReturnBatchToSupplierCommand, SupplierReturn,
        },
        products::find_product,
    },
    entities::{inventory_batch, stock_movement},
    errors::ServiceError,
    events::{Event, EventSender},
    ledger::{batch_store, movement_ledger},
    services::LedgerSettings,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Per-batch audit operations. Every mutation is reason-gated and writes
/// exactly one movement.
#[derive(Clone)]
pub struct BatchAuditService {
    db_pool: Arc<DatabaseConnection>,
    event_sender: EventSender,
    settings: LedgerSettings,
}

impl BatchAuditService {
    pub fn new(
        db_pool: Arc<DatabaseConnection>,
        event_sender: EventSender,
        settings: LedgerSettings,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            settings,
        }
    }

    /// All batches of a product, depleted and returned ones included, FEFO order.
    #[instrument(skip(self))]
    pub async fn get_batches(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<inventory_batch::Model>, ServiceError> {
        find_product(&*self.db_pool, product_id).await?;
        batch_store::batches_for_product(&*self.db_pool, product_id).await
    }

    /// Ledger history of a single batch, oldest first.
    #[instrument(skip(self))]
    pub async fn get_batch_history(
        &self,
        batch_id: i64,
    ) -> Result<Vec<stock_movement::Model>, ServiceError> {
        movement_ledger::for_batch(&*self.db_pool, batch_id).await
    }

    #[instrument(skip(self))]
    pub async fn adjust_batch_quantity(
        &self,
        command: AdjustBatchQuantityCommand,
    ) -> Result<BatchChange, ServiceError> {
        let change =
            commands::execute(&self.db_pool, self.settings.retry_policy, &command).await?;

        self.event_sender
            .publish_committed(vec![
                Event::invalidate_all(),
                Event::BatchAdjusted {
                    batch_id: change.batch_id,
                    product_id: change.product_id,
                    old_quantity: change.old_quantity,
                    new_quantity: change.new_quantity,
                },
            ])
            .await;
        Ok(change)
    }

    #[instrument(skip(self))]
    pub async fn edit_batch_expiry(
        &self,
        command: EditBatchExpiryCommand,
    ) -> Result<ExpiryChange, ServiceError> {
        let edit = commands::execute(&self.db_pool, self.settings.retry_policy, &command).await?;

        self.event_sender
            .publish_committed(vec![
                Event::invalidate_all(),
                Event::BatchExpiryEdited {
                    batch_id: edit.change.batch_id,
                    product_id: edit.change.product_id,
                    old_expiry: edit.old_expiry,
                    new_expiry: edit.new_expiry,
                },
            ])
            .await;
        Ok(edit)
    }

    #[instrument(skip(self))]
    pub async fn delete_batch(&self, command: DeleteBatchCommand) -> Result<BatchChange, ServiceError> {
        let change =
            commands::execute(&self.db_pool, self.settings.retry_policy, &command).await?;

        self.event_sender
            .publish_committed(vec![
                Event::invalidate_all(),
                Event::BatchDeleted {
                    batch_id: change.batch_id,
                    product_id: change.product_id,
                    removed_quantity: change.old_quantity - change.new_quantity,
                },
            ])
            .await;
        Ok(change)
    }

    #[instrument(skip(self))]
    pub async fn return_batch_to_supplier(
        &self,
        command: ReturnBatchToSupplierCommand,
    ) -> Result<SupplierReturn, ServiceError> {
        let returned =
            commands::execute(&self.db_pool, self.settings.retry_policy, &command).await?;

        self.event_sender
            .publish_committed(vec![
                Event::invalidate_all(),
                Event::BatchReturnedToSupplier {
                    batch_id: returned.change.batch_id,
                    product_id: returned.change.product_id,
                    quantity: returned.returned_quantity,
                    fully_returned: returned.fully_returned,
                },
            ])
            .await;
        Ok(returned)
    }
}
