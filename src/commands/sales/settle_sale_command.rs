use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::commands::Command;
use crate::entities::product::{self, Entity as Product};
use crate::entities::{payment, sale, sale_item, PaymentMethod};
use crate::errors::ServiceError;
use crate::ledger::fefo::{self, Deduction, MovementContext};
use crate::ledger::clean_text;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleLineInput {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentInput {
    pub method: PaymentMethod,
    /// Cash handed over. Defaults to the exact total.
    pub amount_tendered: Option<Decimal>,
    /// E-wallet or card transaction id.
    pub reference: Option<String>,
}

/// One checkout: every line is deducted, priced and paid for in a single
/// unit of work, or nothing is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettleSaleCommand {
    pub items: Vec<SaleLineInput>,
    /// Absolute amount taken off the subtotal.
    #[serde(default)]
    pub discount: Decimal,
    /// Fraction of the discounted subtotal, e.g. 0.12. The service fills in
    /// the configured default when absent.
    pub tax_rate: Option<Decimal>,
    pub payment: PaymentInput,
    pub performed_by: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleTotals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleReceipt {
    pub sale: sale::Model,
    pub items: Vec<sale_item::Model>,
    pub payment: payment::Model,
    /// Per-line deductions, in line order.
    pub deductions: Vec<Deduction>,
}

impl SettleSaleCommand {
    /// Subtotal, discount, tax and total from the lines alone.
    pub fn totals(&self) -> Result<SaleTotals, ServiceError> {
        let mut subtotal = Decimal::ZERO;
        for (index, line) in self.items.iter().enumerate() {
            subtotal = subtotal
                .checked_add(line_total(index, line)?)
                .ok_or_else(|| ServiceError::validation("items", "subtotal overflows"))?;
        }
        if self.discount > subtotal {
            return Err(ServiceError::validation(
                "discount",
                format!("{} exceeds the subtotal of {}", self.discount, subtotal),
            ));
        }
        let taxable = subtotal
            .checked_sub(self.discount)
            .ok_or_else(|| ServiceError::validation("discount", "overflows the subtotal"))?;
        let tax = taxable
            .checked_mul(self.tax_rate.unwrap_or_default())
            .ok_or_else(|| ServiceError::validation("tax_rate", "tax overflows"))?
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let total = taxable
            .checked_add(tax)
            .ok_or_else(|| ServiceError::validation("items", "total overflows"))?;
        Ok(SaleTotals {
            subtotal,
            discount: self.discount,
            tax,
            total,
        })
    }

    /// Amount tendered and change due for `total`.
    fn settle_payment(&self, total: Decimal) -> Result<(Decimal, Decimal), ServiceError> {
        let tendered = self.payment.amount_tendered.unwrap_or(total);
        if tendered < total {
            return Err(ServiceError::validation(
                "payment.amount_tendered",
                format!("{} does not cover the total of {}", tendered, total),
            ));
        }
        match self.payment.method {
            PaymentMethod::Cash => Ok((tendered, tendered - total)),
            // Electronic payments are charged the exact amount
            PaymentMethod::GCash | PaymentMethod::Card => Ok((total, Decimal::ZERO)),
        }
    }
}

fn line_total(index: usize, line: &SaleLineInput) -> Result<Decimal, ServiceError> {
    line.unit_price
        .checked_mul(Decimal::from(line.quantity))
        .ok_or_else(|| {
            ServiceError::validation(&format!("items[{}].unit_price", index), "line total overflows")
        })
}

pub fn receipt_number(sale_id: Uuid, at: DateTime<Utc>) -> String {
    let simple = sale_id.simple().to_string().to_uppercase();
    format!("RCPT-{}-{}", at.format("%Y%m%d"), &simple[..8])
}

#[async_trait]
impl Command for SettleSaleCommand {
    type Result = SaleReceipt;
    const NAME: &'static str = "settle_sale";

    fn validate_input(&self) -> Result<(), ServiceError> {
        if self.items.is_empty() {
            return Err(ServiceError::validation("items", "a sale needs at least one item"));
        }
        for (index, line) in self.items.iter().enumerate() {
            if line.quantity <= 0 {
                return Err(ServiceError::validation(
                    &format!("items[{}].quantity", index),
                    "must be greater than zero",
                ));
            }
            if line.unit_price <= Decimal::ZERO {
                return Err(ServiceError::validation(
                    &format!("items[{}].unit_price", index),
                    "must be greater than zero",
                ));
            }
        }
        if self.discount < Decimal::ZERO {
            return Err(ServiceError::validation("discount", "must not be negative"));
        }
        if matches!(self.tax_rate, Some(rate) if rate < Decimal::ZERO || rate > Decimal::ONE) {
            return Err(ServiceError::validation("tax_rate", "must be between 0 and 1"));
        }
        let totals = self.totals()?;
        self.settle_payment(totals.total)?;
        Ok(())
    }

    #[instrument(skip(self, txn), fields(lines = self.items.len(), method = %self.payment.method))]
    async fn execute(&self, txn: &DatabaseTransaction) -> Result<Self::Result, ServiceError> {
        // Every referenced product must exist before anything is touched
        let ids: Vec<Uuid> = self.items.iter().map(|line| line.product_id).collect();
        let products: HashMap<Uuid, product::Model> = Product::find()
            .filter(product::Column::Id.is_in(ids.clone()))
            .all(txn)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        if let Some(missing) = ids.iter().find(|id| !products.contains_key(id)) {
            return Err(ServiceError::NotFound(format!("Product {} not found", missing)));
        }

        let totals = self.totals()?;
        let (tendered, change_due) = self.settle_payment(totals.total)?;

        let now = Utc::now();
        let sale_id = Uuid::new_v4();
        let receipt = receipt_number(sale_id, now);
        let ctx = MovementContext::sale(Some(receipt.clone()), self.performed_by);
        let today = now.date_naive();

        // Ascending product order so concurrent sales take row locks in the same order
        let mut order: Vec<usize> = (0..self.items.len()).collect();
        order.sort_by_key(|&index| self.items[index].product_id);

        let mut deductions: Vec<Option<Deduction>> = vec![None; self.items.len()];
        for index in order {
            let line = &self.items[index];
            let product = products.get(&line.product_id).ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", line.product_id))
            })?;
            let deduction = fefo::deduct(txn, product, line.quantity, &ctx, today).await?;
            deductions[index] = Some(deduction);
        }
        let deductions: Vec<Deduction> = deductions.into_iter().flatten().collect();

        let sale = sale::ActiveModel {
            id: Set(sale_id),
            receipt_number: Set(receipt.clone()),
            user_id: Set(self.performed_by),
            subtotal: Set(totals.subtotal),
            discount: Set(totals.discount),
            tax: Set(totals.tax),
            total: Set(totals.total),
            created_at: Set(now),
        }
        .insert(txn)
        .await?;

        let mut items = Vec::with_capacity(self.items.len());
        for (index, (line, deduction)) in self.items.iter().zip(&deductions).enumerate() {
            let item = sale_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                sale_id: Set(sale.id),
                product_id: Set(line.product_id),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                unit_cost: Set(deduction.unit_cost),
                line_total: Set(line_total(index, line)?),
            }
            .insert(txn)
            .await?;
            items.push(item);
        }

        let payment = payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            sale_id: Set(sale.id),
            method: Set(self.payment.method),
            amount_tendered: Set(tendered),
            change_due: Set(change_due),
            reference: Set(clean_text(self.payment.reference.as_deref())),
        }
        .insert(txn)
        .await?;

        metrics::counter!("stockledger.sales.settled", 1);
        info!(
            sale_id = %sale.id,
            receipt_number = %sale.receipt_number,
            total = %sale.total,
            lines = items.len(),
            "Sale settled"
        );

        Ok(SaleReceipt {
            sale,
            items,
            payment,
            deductions,
        })
    }
}
