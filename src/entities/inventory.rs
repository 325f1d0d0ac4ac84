use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-product stock aggregate.
///
/// For batch-tracked products `current_stock` and `nearest_expiry_date` are a
/// projection of the live batches and are only written by the stock aggregator.
/// Products that never had a batch keep `current_stock` as an independent counter.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub product_id: Uuid,
    pub current_stock: i32,
    pub reorder_level: i32,
    pub last_restock: Option<DateTime<Utc>>,
    pub nearest_expiry_date: Option<NaiveDate>,
    /// Set when the first batch is created and never cleared afterwards.
    pub batch_tracked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id",
        on_delete = "Cascade"
    )]
    Product,
    #[sea_orm(has_many = "super::stock_movement::Entity")]
    StockMovements,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::stock_movement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockMovements.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_out_of_stock(&self) -> bool {
        self.current_stock <= 0
    }

    pub fn is_low_stock(&self) -> bool {
        self.current_stock > 0 && self.current_stock <= self.reorder_level
    }
}
