use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::{ArgAction, Args, Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use stockledger::{
    commands::{
        inventory::{
            AdjustBatchQuantityCommand, AdjustStockCommand, DeleteBatchCommand,
            EditBatchExpiryCommand, RestockCommand, ReturnBatchToSupplierCommand,
        },
        products::RegisterProductCommand,
        sales::{PaymentInput, SaleLineInput, SettleSaleCommand},
    },
    config::{self, AppConfig},
    db,
    entities::{MovementType, PaymentMethod},
    events::{self, EventSender},
    ledger::MovementFilter,
    services::{respond, LedgerServices, LedgerSettings},
    LedgerResponse,
};
use tracing::info;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load_config().context("failed to load application config")?;
    config::init_tracing(config.log_level(), config.log_json);

    let db_pool = db::establish_connection_from_app_config(&config)
        .await
        .context("failed to connect to database")?;
    if config.auto_migrate || matches!(cli.command, Commands::Migrate) {
        db::run_migrations(&db_pool)
            .await
            .context("failed running migrations")?;
    }
    if matches!(cli.command, Commands::Migrate) {
        info!("Migrations applied");
        println!("Migrations applied");
        return Ok(());
    }

    let context = CliContext::new(&config, db_pool);
    match cli.command {
        Commands::Migrate => {}
        Commands::Product(command) => handle_product_command(&context, command, cli.json).await?,
        Commands::Restock(args) => handle_restock(&context, args, cli.json).await?,
        Commands::Adjust(args) => handle_adjust(&context, args, cli.json).await?,
        Commands::Sell(args) => handle_sell(&context, args, cli.json).await?,
        Commands::Batches(args) => handle_batches(&context, args, cli.json).await?,
        Commands::Batch(command) => handle_batch_command(&context, command, cli.json).await?,
        Commands::Movements(args) => handle_movements(&context, args, cli.json).await?,
        Commands::Alerts => handle_alerts(&context, cli.json).await?,
    }

    Ok(())
}

#[derive(Parser)]
#[command(name = "stockledger", about = "Batch-tracked inventory ledger", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending schema migrations
    Migrate,
    #[command(subcommand)]
    Product(ProductCommands),
    /// Receive a delivery as a new batch
    Restock(RestockArgs),
    /// Record an operator stock correction
    Adjust(AdjustArgs),
    /// Settle a sale
    Sell(SellArgs),
    /// List every batch of a product in FEFO order
    Batches(ProductArgs),
    #[command(subcommand)]
    Batch(BatchCommands),
    /// Query the movement ledger
    Movements(MovementArgs),
    /// Out-of-stock, low-stock and expiring batches
    Alerts,
}

#[derive(Subcommand)]
enum ProductCommands {
    Register(RegisterArgs),
    Show(ProductArgs),
}

#[derive(Subcommand)]
enum BatchCommands {
    /// Change a batch's quantity
    Adjust(BatchAdjustArgs),
    /// Change a batch's expiry date
    Expiry(BatchExpiryArgs),
    /// Delete a batch, debiting what it still holds
    Delete(BatchDeleteArgs),
    /// Return a batch, or part of it, to the supplier
    Return(BatchReturnArgs),
}

#[derive(Args)]
struct RegisterArgs {
    #[arg(long)]
    barcode: String,
    #[arg(long)]
    name: String,
    #[arg(long)]
    brand: Option<String>,
    #[arg(long)]
    category: String,
    #[arg(long)]
    cost_price: Decimal,
    #[arg(long)]
    retail_price: Decimal,
    #[arg(long)]
    wholesale_price: Option<Decimal>,
    #[arg(long)]
    reorder_level: Option<i32>,
    #[arg(long, default_value_t = 0)]
    opening_stock: i32,
}

#[derive(Args)]
struct ProductArgs {
    #[arg(long)]
    product_id: Uuid,
}

#[derive(Args)]
struct RestockArgs {
    #[arg(long)]
    product_id: Uuid,
    #[arg(long)]
    quantity: i32,
    #[arg(long, help = "Expiry date (YYYY-MM-DD); omit for goods that do not expire")]
    expiry: Option<NaiveDate>,
    #[arg(long)]
    supplier: Option<String>,
    #[arg(long)]
    reference: Option<String>,
    #[arg(long)]
    cost_price: Option<Decimal>,
    #[arg(long)]
    reason: Option<String>,
}

#[derive(Args)]
struct AdjustArgs {
    #[arg(long)]
    product_id: Uuid,
    #[arg(long, allow_hyphen_values = true)]
    change: i32,
    #[arg(long, default_value = "ADJUSTMENT", help = "ADJUSTMENT, DAMAGE, RETURN or INTERNAL_USE")]
    movement_type: MovementType,
    #[arg(long)]
    reason: String,
    #[arg(long)]
    reference: Option<String>,
    #[arg(long)]
    expiry: Option<NaiveDate>,
}

#[derive(Args)]
struct SellArgs {
    #[arg(
        long = "item",
        required = true,
        value_parser = parse_sale_line,
        help = "Sale line as PRODUCT_ID:QUANTITY:UNIT_PRICE (repeatable)"
    )]
    items: Vec<SaleLineInput>,
    #[arg(long, default_value = "0")]
    discount: Decimal,
    #[arg(long)]
    tax_rate: Option<Decimal>,
    #[arg(long, default_value = "CASH")]
    method: PaymentMethod,
    #[arg(long)]
    tendered: Option<Decimal>,
    #[arg(long)]
    payment_reference: Option<String>,
}

#[derive(Args)]
struct BatchAdjustArgs {
    #[arg(long)]
    batch_id: i64,
    #[arg(long, allow_hyphen_values = true)]
    change: i32,
    #[arg(long)]
    movement_type: Option<MovementType>,
    #[arg(long)]
    reason: String,
}

#[derive(Args)]
struct BatchExpiryArgs {
    #[arg(long)]
    batch_id: i64,
    #[arg(long, help = "New expiry date; omit to mark the batch as non-expiring")]
    expiry: Option<NaiveDate>,
    #[arg(long)]
    reason: String,
}

#[derive(Args)]
struct BatchDeleteArgs {
    #[arg(long)]
    batch_id: i64,
    #[arg(long)]
    reason: String,
}

#[derive(Args)]
struct BatchReturnArgs {
    #[arg(long)]
    batch_id: i64,
    #[arg(long, help = "Units to return; defaults to everything left")]
    quantity: Option<i32>,
    #[arg(long)]
    reason: String,
    #[arg(long)]
    reference: Option<String>,
}

#[derive(Args)]
struct MovementArgs {
    #[arg(long)]
    product_id: Option<Uuid>,
    #[arg(long)]
    batch_id: Option<i64>,
    #[arg(long)]
    movement_type: Option<MovementType>,
    #[arg(long, default_value_t = 1)]
    page: u64,
    #[arg(long, default_value_t = 50)]
    limit: u64,
}

fn parse_sale_line(raw: &str) -> Result<SaleLineInput, String> {
    let parts: Vec<&str> = raw.split(':').collect();
    let [product_id, quantity, unit_price] = parts.as_slice() else {
        return Err(format!("expected PRODUCT_ID:QUANTITY:UNIT_PRICE, got {}", raw));
    };
    Ok(SaleLineInput {
        product_id: product_id.parse().map_err(|e| format!("product id: {}", e))?,
        quantity: quantity.parse().map_err(|e| format!("quantity: {}", e))?,
        unit_price: unit_price.parse().map_err(|e| format!("unit price: {}", e))?,
    })
}

struct CliContext {
    services: LedgerServices,
}

impl CliContext {
    fn new(config: &AppConfig, db_pool: db::DbPool) -> Self {
        let (event_sender, event_rx) = EventSender::channel(config.event_channel_capacity);
        tokio::spawn(events::process_events(event_rx));
        let services = LedgerServices::new(
            Arc::new(db_pool),
            event_sender,
            LedgerSettings::from(config),
        );
        Self { services }
    }
}

/// Prints a service outcome and turns a failure into a non-zero exit.
fn render<T: Serialize>(
    response: LedgerResponse<T>,
    json: bool,
    human: impl FnOnce(&T),
) -> Result<()> {
    if json {
        print_json(&response)?;
    } else if let Some(data) = &response.data {
        human(data);
    }
    match response.error {
        Some(error) if !json => Err(anyhow!(error.message)),
        Some(_) => Err(anyhow!("operation failed")),
        None => Ok(()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn handle_product_command(
    context: &CliContext,
    command: ProductCommands,
    json: bool,
) -> Result<()> {
    let service = &context.services.products;
    match command {
        ProductCommands::Register(args) => {
            let result = service
                .register_product(RegisterProductCommand {
                    barcode: args.barcode,
                    name: args.name,
                    brand: args.brand,
                    category: args.category,
                    cost_price: args.cost_price,
                    retail_price: args.retail_price,
                    wholesale_price: args.wholesale_price,
                    reorder_level: args.reorder_level,
                    opening_stock: args.opening_stock,
                    performed_by: None,
                })
                .await;
            render(respond(result), json, |registered| {
                println!(
                    "Registered {} ({}) with id {}",
                    registered.product.label(),
                    registered.product.barcode,
                    registered.product.id
                );
            })
        }
        ProductCommands::Show(args) => {
            let product = service.find_product(args.product_id).await;
            render(respond(product), json, |p| {
                println!("{} • {} • retail {} • cost {}", p.id, p.label(), p.retail_price, p.cost_price);
            })?;
            let inventory = context.services.inventory.get_inventory(args.product_id).await;
            render(respond(inventory), json, |inv| {
                println!(
                    "  stock {} • reorder at {} • nearest expiry {}",
                    inv.current_stock,
                    inv.reorder_level,
                    inv.nearest_expiry_date
                        .map_or_else(|| "none".to_string(), |d| d.to_string())
                );
            })
        }
    }
}

async fn handle_restock(context: &CliContext, args: RestockArgs, json: bool) -> Result<()> {
    let result = context
        .services
        .inventory
        .restock(RestockCommand {
            product_id: args.product_id,
            quantity: args.quantity,
            expiry_date: args.expiry,
            supplier_name: args.supplier,
            reference: args.reference,
            cost_price: args.cost_price,
            reason: args.reason,
            receipt_image: None,
            performed_by: None,
        })
        .await;
    render(respond(result), json, |r| {
        println!("Batch {} received; stock is now {}", r.batch_id, r.new_stock);
    })
}

async fn handle_adjust(context: &CliContext, args: AdjustArgs, json: bool) -> Result<()> {
    let result = context
        .services
        .inventory
        .adjust_stock(AdjustStockCommand {
            product_id: args.product_id,
            quantity_change: args.change,
            movement_type: args.movement_type,
            reason: args.reason,
            reference: args.reference,
            expiry_date: args.expiry,
            cost_price: None,
            performed_by: None,
        })
        .await;
    render(respond(result), json, |r| {
        println!(
            "{} movement(s) written; stock is now {}",
            r.movement_ids.len(),
            r.new_stock
        );
    })
}

async fn handle_sell(context: &CliContext, args: SellArgs, json: bool) -> Result<()> {
    let result = context
        .services
        .sales
        .settle_sale(SettleSaleCommand {
            items: args.items,
            discount: args.discount,
            tax_rate: args.tax_rate,
            payment: PaymentInput {
                method: args.method,
                amount_tendered: args.tendered,
                reference: args.payment_reference,
            },
            performed_by: None,
        })
        .await;
    render(respond(result), json, |receipt| {
        println!(
            "Receipt {} • subtotal {} • discount {} • tax {} • total {}",
            receipt.sale.receipt_number,
            receipt.sale.subtotal,
            receipt.sale.discount,
            receipt.sale.tax,
            receipt.sale.total
        );
        println!(
            "Paid {} by {} • change {}",
            receipt.payment.amount_tendered, receipt.payment.method, receipt.payment.change_due
        );
    })
}

async fn handle_batches(context: &CliContext, args: ProductArgs, json: bool) -> Result<()> {
    let batches = context.services.batch_audit.get_batches(args.product_id).await;
    render(respond(batches), json, |batches| {
        for batch in batches {
            println!(
                "- Batch {} • qty {} • expires {} • {} • {}",
                batch.id,
                batch.quantity,
                batch
                    .expiry_date
                    .map_or_else(|| "never".to_string(), |d| d.to_string()),
                batch.status,
                batch.supplier_reference.as_deref().unwrap_or("-")
            );
        }
    })
}

async fn handle_batch_command(
    context: &CliContext,
    command: BatchCommands,
    json: bool,
) -> Result<()> {
    let service = &context.services.batch_audit;
    match command {
        BatchCommands::Adjust(args) => {
            let result = service
                .adjust_batch_quantity(AdjustBatchQuantityCommand {
                    batch_id: args.batch_id,
                    quantity_change: args.change,
                    movement_type: args.movement_type,
                    reason: args.reason,
                    reference: None,
                    performed_by: None,
                })
                .await;
            render(respond(result), json, |c| {
                println!(
                    "Batch {}: {} -> {}; stock is now {}",
                    c.batch_id, c.old_quantity, c.new_quantity, c.new_stock
                );
            })
        }
        BatchCommands::Expiry(args) => {
            let result = service
                .edit_batch_expiry(EditBatchExpiryCommand {
                    batch_id: args.batch_id,
                    expiry_date: args.expiry,
                    reason: args.reason,
                    performed_by: None,
                })
                .await;
            render(respond(result), json, |e| {
                println!(
                    "Batch {} expiry {:?} -> {:?}",
                    e.change.batch_id, e.old_expiry, e.new_expiry
                );
            })
        }
        BatchCommands::Delete(args) => {
            let result = service
                .delete_batch(DeleteBatchCommand {
                    batch_id: args.batch_id,
                    reason: args.reason,
                    performed_by: None,
                })
                .await;
            render(respond(result), json, |c| {
                println!("Batch {} deleted; stock is now {}", c.batch_id, c.new_stock);
            })
        }
        BatchCommands::Return(args) => {
            let result = service
                .return_batch_to_supplier(ReturnBatchToSupplierCommand {
                    batch_id: args.batch_id,
                    quantity: args.quantity,
                    reason: args.reason,
                    reference: args.reference,
                    performed_by: None,
                })
                .await;
            render(respond(result), json, |r| {
                println!(
                    "Returned {} unit(s) of batch {} ({}); stock is now {}",
                    r.returned_quantity, r.change.batch_id, r.reference, r.change.new_stock
                );
            })
        }
    }
}

async fn handle_movements(context: &CliContext, args: MovementArgs, json: bool) -> Result<()> {
    let filter = MovementFilter {
        product_id: args.product_id,
        batch_id: args.batch_id,
        movement_type: args.movement_type,
        page: args.page,
        limit: args.limit,
        ..MovementFilter::default()
    };
    let result = context.services.inventory.get_all_movements(filter).await;
    render(respond(result), json, |(movements, total)| {
        println!("{} movement(s) in total", total);
        for m in movements {
            println!(
                "- {} • {} • {:+} ({} -> {}) • batch {} • {}",
                m.created_at.format("%Y-%m-%d %H:%M"),
                m.movement_type,
                m.quantity_change,
                m.previous_stock,
                m.new_stock,
                m.batch_id.map_or_else(|| "-".to_string(), |id| id.to_string()),
                m.reason.as_deref().unwrap_or("")
            );
        }
    })
}

async fn handle_alerts(context: &CliContext, json: bool) -> Result<()> {
    let alerts = context.services.inventory.get_inventory_alerts().await;
    render(respond(alerts), json, |alerts| {
        println!("Out of stock: {}", alerts.out_of_stock.len());
        for a in &alerts.out_of_stock {
            println!("- {} ({})", a.name, a.barcode);
        }
        println!("Low stock: {}", alerts.low_stock.len());
        for a in &alerts.low_stock {
            println!("- {} ({}): {} left, reorder at {}", a.name, a.barcode, a.current_stock, a.reorder_level);
        }
        println!("Expiring soon: {}", alerts.expiring_soon.len());
        for b in &alerts.expiring_soon {
            println!(
                "- {} batch {}: {} unit(s) on {} ({} days)",
                b.name, b.batch_id, b.quantity, b.expiry_date, b.days_left
            );
        }
    })
}
