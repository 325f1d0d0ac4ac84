use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Append-only ledger row. Rows are inserted once and never updated.
///
/// `previous_stock` and `new_stock` are measured on the product aggregate at the
/// moment of the movement. `batch_id` is not a foreign key so the
/// compensating movement of a deleted batch keeps pointing at the removed id.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_movements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
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
    #[sea_orm(column_type = "Decimal(Some((19, 4)))", nullable)]
    pub cost_price: Option<Decimal>,
    pub receipt_image: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::inventory::Entity",
        from = "Column::InventoryId",
        to = "super::inventory::Column::Id"
    )]
    Inventory,
}

impl Related<super::inventory::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Inventory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
    strum::Display, strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum MovementType {
    #[sea_orm(string_value = "INITIAL_STOCK")]
    InitialStock,
    #[sea_orm(string_value = "RESTOCK")]
    Restock,
    #[sea_orm(string_value = "SALE")]
    Sale,
    #[sea_orm(string_value = "ADJUSTMENT")]
    Adjustment,
    #[sea_orm(string_value = "DAMAGE")]
    Damage,
    #[sea_orm(string_value = "RETURN")]
    Return,
    #[sea_orm(string_value = "SUPPLIER_RETURN")]
    SupplierReturn,
    #[sea_orm(string_value = "INTERNAL_USE")]
    InternalUse,
}

/// Sign a manual quantity change must carry for a given movement type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
    Either,
}

impl MovementType {
    /// Types an operator may record through a manual stock adjustment.
    pub const MANUAL: [MovementType; 4] = [
        MovementType::Adjustment,
        MovementType::Damage,
        MovementType::Return,
        MovementType::InternalUse,
    ];

    pub fn is_manual(self) -> bool {
        Self::MANUAL.contains(&self)
    }

    /// Manual movements must always carry an operator reason.
    pub fn requires_reason(self) -> bool {
        match self {
            MovementType::InitialStock | MovementType::Restock | MovementType::Sale => false,
            MovementType::Adjustment
            | MovementType::Damage
            | MovementType::Return
            | MovementType::SupplierReturn
            | MovementType::InternalUse => true,
        }
    }

    pub fn direction(self) -> Direction {
        match self {
            MovementType::InitialStock | MovementType::Restock | MovementType::Return => {
                Direction::Inbound
            }
            MovementType::Sale
            | MovementType::Damage
            | MovementType::SupplierReturn
            | MovementType::InternalUse => Direction::Outbound,
            MovementType::Adjustment => Direction::Either,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn manual_types_and_directions() {
        assert!(MovementType::Damage.is_manual());
        assert!(!MovementType::Sale.is_manual());
        assert!(!MovementType::SupplierReturn.is_manual());
        assert_eq!(MovementType::Return.direction(), Direction::Inbound);
        assert_eq!(MovementType::InternalUse.direction(), Direction::Outbound);
        assert_eq!(MovementType::Adjustment.direction(), Direction::Either);
    }

    #[test]
    fn parses_and_displays_ledger_codes() {
        assert_eq!(MovementType::SupplierReturn.to_string(), "SUPPLIER_RETURN");
        assert_eq!(
            MovementType::from_str("internal_use").unwrap(),
            MovementType::InternalUse
        );
        assert!(MovementType::from_str("THEFT").is_err());
    }
}
