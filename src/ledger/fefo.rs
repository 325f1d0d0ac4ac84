//! First-Expired-First-Out deduction.
//!
//! Planning is pure: [`plan_deduction`] decides how much to take from which
//! batch before anything is written, so a shortfall never leaves a batch
//! half-consumed. [`deduct`] then applies the plan inside the caller's
//! transaction and appends one movement per batch touched.

use chrono::NaiveDate;
use metrics::counter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{info, warn};
use uuid::Uuid;

use sea_orm::ConnectionTrait;

use crate::entities::{inventory_batch, product, MovementType};
use crate::errors::ServiceError;
use crate::ledger::movement_ledger::{self, NewMovement};
use crate::ledger::{batch_store, stock_aggregator};

/// Consumption order: earliest expiry first, undated batches last, then
/// received date, then batch id.
pub fn fefo_order(a: &inventory_batch::Model, b: &inventory_batch::Model) -> Ordering {
    let by_expiry = match (a.expiry_date, b.expiry_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_expiry
        .then_with(|| a.received_date.cmp(&b.received_date))
        .then_with(|| a.id.cmp(&b.id))
}

pub fn sort_fefo(batches: &mut [inventory_batch::Model]) {
    batches.sort_by(fefo_order);
}

/// One step of a deduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConsumption {
    pub batch_id: i64,
    pub quantity_used: i32,
    /// Expired stock is still sold, only flagged.
    pub was_expired: bool,
}

/// Live stock was not enough for the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortfall {
    pub requested: i32,
    pub available: i32,
}

impl Shortfall {
    pub fn missing(&self) -> i32 {
        self.requested - self.available
    }
}

/// Walks the live batches in FEFO order and takes `min(batch, remaining)` from
/// each until `quantity` is covered.
pub fn plan_deduction(
    batches: &[inventory_batch::Model],
    quantity: i32,
    today: NaiveDate,
) -> Result<Vec<BatchConsumption>, Shortfall> {
    let mut live: Vec<&inventory_batch::Model> =
        batches.iter().filter(|batch| batch.is_live()).collect();
    live.sort_by(|a, b| fefo_order(a, b));

    let mut remaining = quantity;
    let mut steps = Vec::new();
    for batch in live {
        if remaining <= 0 {
            break;
        }
        let used = remaining.min(batch.quantity);
        steps.push(BatchConsumption {
            batch_id: batch.id,
            quantity_used: used,
            was_expired: batch.is_expired_on(today),
        });
        remaining -= used;
    }

    if remaining > 0 {
        return Err(Shortfall {
            requested: quantity,
            available: quantity - remaining,
        });
    }
    Ok(steps)
}

/// Who and what a deduction is recorded against.
#[derive(Debug, Clone)]
pub struct MovementContext {
    pub movement_type: MovementType,
    pub user_id: Option<Uuid>,
    pub reason: Option<String>,
    pub reference: Option<String>,
}

impl MovementContext {
    pub fn sale(reference: Option<String>, user_id: Option<Uuid>) -> Self {
        Self {
            movement_type: MovementType::Sale,
            user_id,
            reason: None,
            reference,
        }
    }
}

/// Outcome of an applied deduction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deduction {
    pub product_id: Uuid,
    pub quantity: i32,
    pub batches_used: Vec<BatchConsumption>,
    pub movement_ids: Vec<Uuid>,
    pub previous_stock: i32,
    pub new_stock: i32,
    /// Quantity-weighted cost of the consumed units.
    pub unit_cost: Decimal,
    /// Drawn from the legacy counter rather than batches.
    pub legacy: bool,
}

/// Structured `{success, batches_used, error}` answer for callers that do not
/// want a `Result`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeductionResult {
    pub success: bool,
    pub batches_used: Vec<BatchConsumption>,
    pub error: Option<String>,
}

impl From<&Result<Deduction, ServiceError>> for DeductionResult {
    fn from(result: &Result<Deduction, ServiceError>) -> Self {
        match result {
            Ok(deduction) => Self {
                success: true,
                batches_used: deduction.batches_used.clone(),
                error: None,
            },
            Err(e) => Self {
                success: false,
                batches_used: Vec::new(),
                error: Some(e.response_message()),
            },
        }
    }
}

/// Takes `quantity` units of `product` out of stock.
///
/// Batch-tracked products are drawn FEFO; products that never had a batch use
/// the legacy counter. A batch-tracked product without live batches is short,
/// never a legacy fallback.
pub async fn deduct<C: ConnectionTrait>(
    conn: &C,
    product: &product::Model,
    quantity: i32,
    ctx: &MovementContext,
    today: NaiveDate,
) -> Result<Deduction, ServiceError> {
    if quantity <= 0 {
        return Err(ServiceError::validation(
            "quantity",
            "must be greater than zero",
        ));
    }

    let inventory = stock_aggregator::inventory_for_update(conn, product.id).await?;
    if !inventory.batch_tracked {
        return deduct_legacy(conn, product, inventory, quantity, ctx).await;
    }

    let batches = batch_store::live_batches_for_update(conn, product.id).await?;
    let plan = plan_deduction(&batches, quantity, today).map_err(|shortfall| {
        counter!("stockledger.fefo.insufficient_stock", 1);
        warn!(
            product_id = %product.id,
            requested = shortfall.requested,
            available = shortfall.available,
            missing = shortfall.missing(),
            "FEFO deduction short"
        );
        ServiceError::InsufficientStock {
            product_id: product.id,
            product: product.label(),
            requested: shortfall.requested,
            available: shortfall.available,
        }
    })?;

    let previous_stock = stock_aggregator::aggregate(&batches)?.current_stock;
    let mut running = previous_stock;
    let mut movement_ids = Vec::with_capacity(plan.len());
    let mut cost_total = Decimal::ZERO;

    for step in &plan {
        let batch = batches
            .iter()
            .find(|batch| batch.id == step.batch_id)
            .cloned()
            .ok_or_else(|| {
                ServiceError::InternalError(format!("Planned batch {} vanished", step.batch_id))
            })?;
        let batch_cost = batch.cost_price;
        let remaining = batch.quantity - step.quantity_used;
        batch_store::set_quantity(conn, batch, remaining).await?;

        if step.was_expired {
            counter!("stockledger.fefo.expired_units_sold", step.quantity_used as u64);
            warn!(
                product_id = %product.id,
                batch_id = step.batch_id,
                quantity = step.quantity_used,
                "Expired stock deducted"
            );
        }

        let movement = movement_ledger::record(
            conn,
            NewMovement::new(
                inventory.id,
                ctx.movement_type,
                running,
                running - step.quantity_used,
            )
            .batch(step.batch_id)
            .user(ctx.user_id)
            .reason(ctx.reason.clone())
            .reference(ctx.reference.clone())
            .cost(batch_cost),
        )
        .await?;
        movement_ids.push(movement.id);

        running -= step.quantity_used;
        cost_total = Decimal::from(step.quantity_used)
            .checked_mul(batch_cost.unwrap_or(product.cost_price))
            .and_then(|cost| cost_total.checked_add(cost))
            .ok_or_else(|| {
                ServiceError::InvalidAdjustment(format!(
                    "Cost of goods for product {} overflows",
                    product.id
                ))
            })?;
    }

    let inventory = stock_aggregator::recompute(conn, inventory).await?;
    counter!("stockledger.fefo.deductions", 1);
    info!(
        product_id = %product.id,
        quantity,
        batches = plan.len(),
        new_stock = inventory.current_stock,
        "FEFO deduction applied"
    );

    Ok(Deduction {
        product_id: product.id,
        quantity,
        batches_used: plan,
        movement_ids,
        previous_stock,
        new_stock: inventory.current_stock,
        unit_cost: (cost_total / Decimal::from(quantity)).round_dp(4),
        legacy: false,
    })
}

async fn deduct_legacy<C: ConnectionTrait>(
    conn: &C,
    product: &product::Model,
    inventory: crate::entities::inventory::Model,
    quantity: i32,
    ctx: &MovementContext,
) -> Result<Deduction, ServiceError> {
    let previous_stock = inventory.current_stock;
    if quantity > previous_stock {
        counter!("stockledger.fefo.insufficient_stock", 1);
        return Err(ServiceError::InsufficientStock {
            product_id: product.id,
            product: product.label(),
            requested: quantity,
            available: previous_stock.max(0),
        });
    }

    let inventory_id = inventory.id;
    let inventory = stock_aggregator::legacy_adjust(conn, inventory, -quantity).await?;
    let movement = movement_ledger::record(
        conn,
        NewMovement::new(
            inventory_id,
            ctx.movement_type,
            previous_stock,
            inventory.current_stock,
        )
        .user(ctx.user_id)
        .reason(ctx.reason.clone())
        .reference(ctx.reference.clone())
        .cost(Some(product.cost_price)),
    )
    .await?;

    info!(
        product_id = %product.id,
        quantity,
        new_stock = inventory.current_stock,
        "Legacy stock deduction applied"
    );

    Ok(Deduction {
        product_id: product.id,
        quantity,
        batches_used: Vec::new(),
        movement_ids: vec![movement.id],
        previous_stock,
        new_stock: inventory.current_stock,
        unit_cost: product.cost_price,
        legacy: true,
    })
}
