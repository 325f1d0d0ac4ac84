use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait, QueryFilter,
    Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::commands::Command;
use crate::entities::product::{self, Entity as Product};
use crate::entities::{inventory, MovementType};
use crate::errors::ServiceError;
use crate::ledger::clean_text;
use crate::ledger::movement_ledger::{self, NewMovement};

/// Looks up a catalog product or fails with `NotFound`.
pub async fn find_product<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
) -> Result<product::Model, ServiceError> {
    Product::find_by_id(product_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
}

pub(crate) fn validate_money(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        let mut err = ValidationError::new("money");
        err.message = Some("must not be negative".into());
        return Err(err);
    }
    Ok(())
}

/// Adds a product to the catalog together with its inventory row.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterProductCommand {
    #[validate(length(min = 1, max = 64))]
    pub barcode: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub brand: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    #[validate(custom = "validate_money")]
    pub cost_price: Decimal,
    #[validate(custom = "validate_money")]
    pub retail_price: Decimal,
    #[validate(custom = "validate_money")]
    pub wholesale_price: Option<Decimal>,
    #[validate(range(min = 0))]
    pub reorder_level: Option<i32>,
    /// Units already on the shelf, kept on the legacy counter until the first batch arrives.
    #[validate(range(min = 0))]
    pub opening_stock: i32,
    pub performed_by: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredProduct {
    pub product: product::Model,
    pub inventory: inventory::Model,
}

#[async_trait]
impl Command for RegisterProductCommand {
    type Result = RegisteredProduct;
    const NAME: &'static str = "register_product";

    fn validate_input(&self) -> Result<(), ServiceError> {
        self.validate()?;
        if self.barcode.trim().is_empty() {
            return Err(ServiceError::validation("barcode", "must not be blank"));
        }
        Ok(())
    }

    #[instrument(skip(self, txn), fields(barcode = %self.barcode))]
    async fn execute(&self, txn: &DatabaseTransaction) -> Result<Self::Result, ServiceError> {
        let barcode = self.barcode.trim().to_string();
        let existing = Product::find()
            .filter(product::Column::Barcode.eq(barcode.as_str()))
            .one(txn)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::validation(
                "barcode",
                format!("{} is already registered", barcode),
            ));
        }

        let now = Utc::now();
        let product = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            barcode: Set(barcode),
            name: Set(self.name.trim().to_string()),
            brand: Set(clean_text(self.brand.as_deref())),
            category: Set(self.category.trim().to_string()),
            cost_price: Set(self.cost_price),
            retail_price: Set(self.retail_price),
            wholesale_price: Set(self.wholesale_price),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(txn)
        .await?;

        let inventory = inventory::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product.id),
            current_stock: Set(self.opening_stock),
            reorder_level: Set(self.reorder_level.unwrap_or_default()),
            last_restock: Set((self.opening_stock > 0).then_some(now)),
            nearest_expiry_date: Set(None),
            batch_tracked: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(txn)
        .await?;

        if self.opening_stock > 0 {
            movement_ledger::record(
                txn,
                NewMovement::new(inventory.id, MovementType::InitialStock, 0, self.opening_stock)
                    .user(self.performed_by)
                    .reason(Some("Opening stock".to_string()))
                    .cost(Some(self.cost_price)),
            )
            .await?;
        }

        info!(
            product_id = %product.id,
            opening_stock = self.opening_stock,
            "Product registered"
        );
        Ok(RegisteredProduct { product, inventory })
    }
}
