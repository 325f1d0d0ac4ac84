use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Catalog product referenced by inventory batches and sale lines.
///
/// The catalog owns these rows; the ledger only updates `cost_price` when a
/// restock brings in a new unit cost.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub barcode: String,
    pub name: String,
    pub brand: Option<String>,
    pub category: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub cost_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub retail_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))", nullable)]
    pub wholesale_price: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::inventory::Entity")]
    Inventory,
    #[sea_orm(has_many = "super::inventory_batch::Entity")]
    InventoryBatches,
}

impl Related<super::inventory::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Inventory.def()
    }
}

impl Related<super::inventory_batch::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InventoryBatches.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Display label used in user-facing messages.
    pub fn label(&self) -> String {
        match &self.brand {
            Some(brand) if !brand.trim().is_empty() => format!("{} {}", brand, self.name),
            _ => self.name.clone(),
        }
    }
}
