use crate::{
    commands::{
        self,
        products::{find_product, RegisterProductCommand, RegisteredProduct},
    },
    entities::product::{self, Entity as Product},
    errors::ServiceError,
    events::{Event, EventSender},
    services::LedgerSettings,
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Catalog lookups and product registration
#[derive(Clone)]
pub struct ProductService {
    db_pool: Arc<DatabaseConnection>,
    event_sender: EventSender,
    settings: LedgerSettings,
}

impl ProductService {
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

    /// Registers a product and opens its inventory row. A missing reorder
    /// level falls back to the configured default.
    #[instrument(skip(self), fields(barcode = %command.barcode))]
    pub async fn register_product(
        &self,
        mut command: RegisterProductCommand,
    ) -> Result<RegisteredProduct, ServiceError> {
        command
            .reorder_level
            .get_or_insert(self.settings.default_reorder_level);
        let registered =
            commands::execute(&self.db_pool, self.settings.retry_policy, &command).await?;

        self.event_sender
            .publish_committed(vec![
                Event::invalidate_all(),
                Event::ProductRegistered {
                    product_id: registered.product.id,
                    opening_stock: command.opening_stock,
                },
            ])
            .await;
        Ok(registered)
    }

    pub async fn find_product(&self, product_id: Uuid) -> Result<product::Model, ServiceError> {
        find_product(&*self.db_pool, product_id).await
    }

    pub async fn find_by_barcode(&self, barcode: &str) -> Result<product::Model, ServiceError> {
        Product::find()
            .filter(product::Column::Barcode.eq(barcode.trim()))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("No product with barcode {}", barcode)))
    }
}
