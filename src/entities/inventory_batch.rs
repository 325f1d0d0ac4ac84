use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One received delivery lot of a product.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_batches")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub product_id: Uuid,
    pub quantity: i32,
    pub expiry_date: Option<NaiveDate>,
    pub received_date: DateTime<Utc>,
    pub supplier_name: Option<String>,
    pub supplier_reference: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))", nullable)]
    pub cost_price: Option<Decimal>,
    pub document_reference: Option<String>,
    pub status: BatchStatus,
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
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Batch lifecycle. A deleted batch has no row at all.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    #[sea_orm(string_value = "ACTIVE")]
    Active,
    #[sea_orm(string_value = "DEPLETED")]
    Depleted,
    #[sea_orm(string_value = "RETURNED_TO_SUPPLIER")]
    ReturnedToSupplier,
}

impl BatchStatus {
    /// Status a non-returned batch takes for the given quantity.
    pub fn for_quantity(quantity: i32) -> Self {
        if quantity > 0 {
            BatchStatus::Active
        } else {
            BatchStatus::Depleted
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BatchStatus::ReturnedToSupplier)
    }
}

impl Model {
    /// Live batches are the only ones FEFO draws from and the aggregate counts.
    pub fn is_live(&self) -> bool {
        self.status == BatchStatus::Active && self.quantity > 0
    }

    pub fn is_expired_on(&self, today: NaiveDate) -> bool {
        self.expiry_date.map_or(false, |expiry| expiry < today)
    }
}
