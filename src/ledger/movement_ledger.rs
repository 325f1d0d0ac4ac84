use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;
use validator::Validate;

use crate::entities::inventory::{self, Entity as Inventory};
use crate::entities::stock_movement::{self, Entity as StockMovement, MovementType};
use crate::errors::ServiceError;

/// A ledger entry about to be appended.
#[derive(Debug, Clone)]
pub struct NewMovement {
    pub inventory_id: Uuid,
    pub batch_id: Option<i64>,
    pub user_id: Option<Uuid>,
    pub movement_type: MovementType,
    pub quantity_change: i32,
    pub previous_stock: i32,
    pub new_stock: i32,
    pub reason: Option<String>,
    pub reference: Option<String>,
    pub supplier_name: Option<String>,
    pub cost_price: Option<Decimal>,
    pub receipt_image: Option<String>,
}

impl NewMovement {
    pub fn new(
        inventory_id: Uuid,
        movement_type: MovementType,
        previous_stock: i32,
        new_stock: i32,
    ) -> Self {
        debug_assert!(previous_stock >= 0 && new_stock >= 0);
        Self {
            inventory_id,
            batch_id: None,
            user_id: None,
            movement_type,
            quantity_change: new_stock - previous_stock,
            previous_stock,
            new_stock,
            reason: None,
            reference: None,
            supplier_name: None,
            cost_price: None,
            receipt_image: None,
        }
    }

    pub fn batch(mut self, batch_id: i64) -> Self {
        self.batch_id = Some(batch_id);
        self
    }

    pub fn user(mut self, user_id: Option<Uuid>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }

    pub fn reference(mut self, reference: Option<String>) -> Self {
        self.reference = reference;
        self
    }

    pub fn supplier(mut self, supplier_name: Option<String>) -> Self {
        self.supplier_name = supplier_name;
        self
    }

    pub fn cost(mut self, cost_price: Option<Decimal>) -> Self {
        self.cost_price = cost_price;
        self
    }

    pub fn receipt_image(mut self, receipt_image: Option<String>) -> Self {
        self.receipt_image = receipt_image;
        self
    }
}

/// Appends one immutable movement row.
pub async fn record<C: ConnectionTrait>(
    conn: &C,
    movement: NewMovement,
) -> Result<stock_movement::Model, ServiceError> {
    if movement.movement_type.requires_reason() && movement.reason.is_none() {
        return Err(ServiceError::validation(
            "reason",
            format!("is required for {} movements", movement.movement_type),
        ));
    }

    let row = stock_movement::ActiveModel {
        id: Set(Uuid::new_v4()),
        inventory_id: Set(movement.inventory_id),
        batch_id: Set(movement.batch_id),
        user_id: Set(movement.user_id),
        movement_type: Set(movement.movement_type),
        quantity_change: Set(movement.quantity_change),
        previous_stock: Set(movement.previous_stock),
        new_stock: Set(movement.new_stock),
        reason: Set(movement.reason),
        reference: Set(movement.reference),
        supplier_name: Set(movement.supplier_name),
        cost_price: Set(movement.cost_price),
        receipt_image: Set(movement.receipt_image),
        created_at: Set(Utc::now()),
    }
    .insert(conn)
    .await?;

    debug!(
        movement_id = %row.id,
        movement_type = %row.movement_type,
        quantity_change = row.quantity_change,
        batch_id = ?row.batch_id,
        "Movement recorded"
    );
    Ok(row)
}

/// Most recent movements of one inventory aggregate, newest first.
pub async fn recent_for_inventory<C: ConnectionTrait>(
    conn: &C,
    inventory_id: Uuid,
    limit: u64,
) -> Result<Vec<stock_movement::Model>, ServiceError> {
    Ok(StockMovement::find()
        .filter(stock_movement::Column::InventoryId.eq(inventory_id))
        .order_by_desc(stock_movement::Column::CreatedAt)
        .limit(limit)
        .all(conn)
        .await?)
}

pub async fn has_movements<C: ConnectionTrait>(
    conn: &C,
    inventory_id: Uuid,
) -> Result<bool, ServiceError> {
    let count = StockMovement::find()
        .filter(stock_movement::Column::InventoryId.eq(inventory_id))
        .count(conn)
        .await?;
    Ok(count > 0)
}

pub async fn for_batch<C: ConnectionTrait>(
    conn: &C,
    batch_id: i64,
) -> Result<Vec<stock_movement::Model>, ServiceError> {
    Ok(StockMovement::find()
        .filter(stock_movement::Column::BatchId.eq(batch_id))
        .order_by_asc(stock_movement::Column::CreatedAt)
        .all(conn)
        .await?)
}

/// Audit query over the whole ledger.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MovementFilter {
    pub product_id: Option<Uuid>,
    pub batch_id: Option<i64>,
    pub movement_type: Option<MovementType>,
    pub user_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    #[validate(range(min = 1))]
    pub page: u64,
    #[validate(range(min = 1, max = 1000))]
    pub limit: u64,
}

impl Default for MovementFilter {
    fn default() -> Self {
        Self {
            product_id: None,
            batch_id: None,
            movement_type: None,
            user_id: None,
            from: None,
            to: None,
            page: 1,
            limit: 50,
        }
    }
}

/// One page of movements matching `filter`, newest first, plus the total match count.
pub async fn search<C: ConnectionTrait>(
    conn: &C,
    filter: &MovementFilter,
) -> Result<(Vec<stock_movement::Model>, u64), ServiceError> {
    filter.validate()?;

    let mut condition = Condition::all();
    if let Some(product_id) = filter.product_id {
        let inventory = Inventory::find()
            .filter(inventory::Column::ProductId.eq(product_id))
            .one(conn)
            .await?;
        match inventory {
            Some(inventory) => {
                condition = condition.add(stock_movement::Column::InventoryId.eq(inventory.id));
            }
            None => return Ok((Vec::new(), 0)),
        }
    }
    if let Some(batch_id) = filter.batch_id {
        condition = condition.add(stock_movement::Column::BatchId.eq(batch_id));
    }
    if let Some(movement_type) = filter.movement_type {
        condition = condition.add(stock_movement::Column::MovementType.eq(movement_type));
    }
    if let Some(user_id) = filter.user_id {
        condition = condition.add(stock_movement::Column::UserId.eq(user_id));
    }
    if let Some(from) = filter.from {
        condition = condition.add(stock_movement::Column::CreatedAt.gte(from));
    }
    if let Some(to) = filter.to {
        condition = condition.add(stock_movement::Column::CreatedAt.lte(to));
    }

    let paginator = StockMovement::find()
        .filter(condition)
        .order_by_desc(stock_movement::Column::CreatedAt)
        .paginate(conn, filter.limit);
    let total = paginator.num_items().await?;
    let rows = paginator.fetch_page(filter.page - 1).await?;
    Ok((rows, total))
}
