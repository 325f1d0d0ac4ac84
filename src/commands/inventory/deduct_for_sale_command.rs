use async_trait::async_trait;
use chrono::Utc;
use sea_orm::DatabaseTransaction;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::commands::products::find_product;
use crate::commands::Command;
use crate::errors::ServiceError;
use crate::ledger::fefo::{self, Deduction, MovementContext};
use crate::ledger::clean_text;

/// Takes one line's worth of units out of stock, FEFO.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DeductForSaleCommand {
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
    /// Receipt number the SALE movements point at.
    pub reference: Option<String>,
    pub performed_by: Option<Uuid>,
}

#[async_trait]
impl Command for DeductForSaleCommand {
    type Result = Deduction;
    const NAME: &'static str = "deduct_for_sale";

    fn validate_input(&self) -> Result<(), ServiceError> {
        Ok(self.validate()?)
    }

    #[instrument(skip(self, txn), fields(product_id = %self.product_id, quantity = self.quantity))]
    async fn execute(&self, txn: &DatabaseTransaction) -> Result<Self::Result, ServiceError> {
        let product = find_product(txn, self.product_id).await?;
        let ctx = MovementContext::sale(clean_text(self.reference.as_deref()), self.performed_by);
        fefo::deduct(txn, &product, self.quantity, &ctx, Utc::now().date_naive()).await
    }
}
