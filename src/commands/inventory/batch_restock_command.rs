use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::DatabaseTransaction;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use super::restock_command::{receive, DeliveryHeader, DeliveryLine, RestockResult};
use crate::commands::products::validate_money;
use crate::commands::Command;
use crate::errors::ServiceError;
use crate::ledger::clean_text;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BatchRestockItem {
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
    pub expiry_date: Option<NaiveDate>,
    #[validate(custom = "validate_money")]
    pub cost_price: Option<Decimal>,
}

/// One delivery covering several products. Either every line is booked or none.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRestockCommand {
    pub items: Vec<BatchRestockItem>,
    pub supplier_name: Option<String>,
    pub reference: Option<String>,
    pub reason: Option<String>,
    pub receipt_image: Option<String>,
    pub performed_by: Option<Uuid>,
}

#[async_trait]
impl Command for BatchRestockCommand {
    type Result = Vec<RestockResult>;
    const NAME: &'static str = "batch_restock";

    fn validate_input(&self) -> Result<(), ServiceError> {
        if self.items.is_empty() {
            return Err(ServiceError::validation("items", "must not be empty"));
        }
        for (index, item) in self.items.iter().enumerate() {
            item.validate().map_err(|e| {
                ServiceError::validation(&format!("items[{}]", index), e.to_string())
            })?;
        }
        Ok(())
    }

    #[instrument(skip(self, txn), fields(lines = self.items.len()))]
    async fn execute(&self, txn: &DatabaseTransaction) -> Result<Self::Result, ServiceError> {
        let header = DeliveryHeader {
            supplier_name: clean_text(self.supplier_name.as_deref()),
            reference: clean_text(self.reference.as_deref()),
            reason: clean_text(self.reason.as_deref()),
            receipt_image: clean_text(self.receipt_image.as_deref()),
            performed_by: self.performed_by,
        };

        let mut results = Vec::with_capacity(self.items.len());
        for item in &self.items {
            let line = DeliveryLine {
                product_id: item.product_id,
                quantity: item.quantity,
                expiry_date: item.expiry_date,
                cost_price: item.cost_price,
            };
            results.push(receive(txn, &header, &line).await?);
        }

        info!(lines = results.len(), "Delivery booked");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn empty_delivery_is_rejected() {
        let cmd = BatchRestockCommand {
            items: vec![],
            supplier_name: Some("Puregold Wholesale".into()),
            reference: None,
            reason: None,
            receipt_image: None,
            performed_by: None,
        };
        assert_matches!(cmd.validate_input(), Err(ServiceError::ValidationError(msg)) if msg.starts_with("items"));
    }

    #[test]
    fn invalid_line_names_its_index() {
        let good = BatchRestockItem {
            product_id: Uuid::new_v4(),
            quantity: 6,
            expiry_date: None,
            cost_price: None,
        };
        let bad = BatchRestockItem {
            quantity: 0,
            ..good.clone()
        };
        let cmd = BatchRestockCommand {
            items: vec![good, bad],
            supplier_name: None,
            reference: None,
            reason: None,
            receipt_image: None,
            performed_by: None,
        };
        assert_matches!(cmd.validate_input(), Err(ServiceError::ValidationError(msg)) if msg.starts_with("items[1]"));
    }
}
