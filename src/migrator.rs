use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_products_table::Migration),
            Box::new(m20240301_000002_create_inventory_table::Migration),
            Box::new(m20240301_000003_create_inventory_batches_table::Migration),
            Box::new(m20240301_000004_create_stock_movements_table::Migration),
            Box::new(m20240301_000005_create_sales_tables::Migration),
        ]
    }
}

mod m20240301_000001_create_products_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_products_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Products::Barcode)
                                .string_len(64)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::Brand).string().null())
                        .col(ColumnDef::new(Products::Category).string().not_null())
                        .col(
                            ColumnDef::new(Products::CostPrice)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::RetailPrice)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::WholesalePrice)
                                .decimal_len(19, 4)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Products::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Products {
        Table,
        Id,
        Barcode,
        Name,
        Brand,
        Category,
        CostPrice,
        RetailPrice,
        WholesalePrice,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000002_create_inventory_table {
    use super::m20240301_000001_create_products_table::Products;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_inventory_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Inventory::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Inventory::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Inventory::ProductId)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Inventory::CurrentStock)
                                .integer()
                                .not_null()
                                .default(0)
                                .check(Expr::col(Inventory::CurrentStock).gte(0)),
                        )
                        .col(
                            ColumnDef::new(Inventory::ReorderLevel)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Inventory::LastRestock)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Inventory::NearestExpiryDate).date().null())
                        .col(
                            ColumnDef::new(Inventory::BatchTracked)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Inventory::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Inventory::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inventory_product_id")
                                .from(Inventory::Table, Inventory::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Inventory::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Inventory {
        Table,
        Id,
        ProductId,
        CurrentStock,
        ReorderLevel,
        LastRestock,
        NearestExpiryDate,
        BatchTracked,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000003_create_inventory_batches_table {
    use super::m20240301_000001_create_products_table::Products;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_inventory_batches_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(InventoryBatches::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InventoryBatches::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(InventoryBatches::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(InventoryBatches::Quantity)
                                .integer()
                                .not_null()
                                .check(Expr::col(InventoryBatches::Quantity).gte(0)),
                        )
                        .col(ColumnDef::new(InventoryBatches::ExpiryDate).date().null())
                        .col(
                            ColumnDef::new(InventoryBatches::ReceivedDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryBatches::SupplierName).string().null())
                        .col(
                            ColumnDef::new(InventoryBatches::SupplierReference)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(InventoryBatches::CostPrice)
                                .decimal_len(19, 4)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(InventoryBatches::DocumentReference)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(InventoryBatches::Status)
                                .string_len(32)
                                .not_null()
                                .default("ACTIVE"),
                        )
                        .col(
                            ColumnDef::new(InventoryBatches::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryBatches::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inventory_batches_product_id")
                                .from(InventoryBatches::Table, InventoryBatches::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            // FEFO scans a product's batches by expiry
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inventory_batches_product_expiry")
                        .table(InventoryBatches::Table)
                        .col(InventoryBatches::ProductId)
                        .col(InventoryBatches::ExpiryDate)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(InventoryBatches::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum InventoryBatches {
        Table,
        Id,
        ProductId,
        Quantity,
        ExpiryDate,
        ReceivedDate,
        SupplierName,
        SupplierReference,
        CostPrice,
        DocumentReference,
        Status,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000004_create_stock_movements_table {
    use super::m20240301_000002_create_inventory_table::Inventory;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_stock_movements_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockMovements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockMovements::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::InventoryId).uuid().not_null())
                        // No foreign key: the id of a deleted batch stays on its movements
                        .col(ColumnDef::new(StockMovements::BatchId).big_integer().null())
                        .col(ColumnDef::new(StockMovements::UserId).uuid().null())
                        .col(
                            ColumnDef::new(StockMovements::MovementType)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::QuantityChange)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::PreviousStock)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::NewStock).integer().not_null())
                        .col(ColumnDef::new(StockMovements::Reason).text().null())
                        .col(ColumnDef::new(StockMovements::Reference).string().null())
                        .col(ColumnDef::new(StockMovements::SupplierName).string().null())
                        .col(
                            ColumnDef::new(StockMovements::CostPrice)
                                .decimal_len(19, 4)
                                .null(),
                        )
                        .col(ColumnDef::new(StockMovements::ReceiptImage).string().null())
                        .col(
                            ColumnDef::new(StockMovements::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_movements_inventory_id")
                                .from(StockMovements::Table, StockMovements::InventoryId)
                                .to(Inventory::Table, Inventory::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_movements_inventory_created")
                        .table(StockMovements::Table)
                        .col(StockMovements::InventoryId)
                        .col(StockMovements::CreatedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_movements_batch_id")
                        .table(StockMovements::Table)
                        .col(StockMovements::BatchId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockMovements::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum StockMovements {
        Table,
        Id,
        InventoryId,
        BatchId,
        UserId,
        MovementType,
        QuantityChange,
        PreviousStock,
        NewStock,
        Reason,
        Reference,
        SupplierName,
        CostPrice,
        ReceiptImage,
        CreatedAt,
    }
}

mod m20240301_000005_create_sales_tables {
    use super::m20240301_000001_create_products_table::Products;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000005_create_sales_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Sales::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Sales::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Sales::ReceiptNumber)
                                .string_len(64)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Sales::UserId).uuid().null())
                        .col(ColumnDef::new(Sales::Subtotal).decimal_len(19, 4).not_null())
                        .col(ColumnDef::new(Sales::Discount).decimal_len(19, 4).not_null())
                        .col(ColumnDef::new(Sales::Tax).decimal_len(19, 4).not_null())
                        .col(ColumnDef::new(Sales::Total).decimal_len(19, 4).not_null())
                        .col(
                            ColumnDef::new(Sales::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(SaleItems::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(SaleItems::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(SaleItems::SaleId).uuid().not_null())
                        .col(ColumnDef::new(SaleItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(SaleItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(SaleItems::UnitPrice)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SaleItems::UnitCost)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SaleItems::LineTotal)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_sale_items_sale_id")
                                .from(SaleItems::Table, SaleItems::SaleId)
                                .to(Sales::Table, Sales::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_sale_items_product_id")
                                .from(SaleItems::Table, SaleItems::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Payments::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Payments::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Payments::SaleId).uuid().not_null())
                        .col(ColumnDef::new(Payments::Method).string_len(16).not_null())
                        .col(
                            ColumnDef::new(Payments::AmountTendered)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Payments::ChangeDue)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Payments::Reference).string().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_payments_sale_id")
                                .from(Payments::Table, Payments::SaleId)
                                .to(Sales::Table, Sales::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_sale_items_sale_id")
                        .table(SaleItems::Table)
                        .col(SaleItems::SaleId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Payments::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(SaleItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Sales::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Sales {
        Table,
        Id,
        ReceiptNumber,
        UserId,
        Subtotal,
        Discount,
        Tax,
        Total,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum SaleItems {
        Table,
        Id,
        SaleId,
        ProductId,
        Quantity,
        UnitPrice,
        UnitCost,
        LineTotal,
    }

    #[derive(DeriveIden)]
    enum Payments {
        Table,
        Id,
        SaleId,
        Method,
        AmountTendered,
        ChangeDue,
        Reference,
    }
}
