#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::DatabaseConnection;
use stockledger::{
    commands::{inventory::RestockCommand, products::RegisterProductCommand},
    db::{self, DbConfig, RetryPolicy},
    entities::{inventory_batch, product},
    events::{Event, EventSender},
    services::{LedgerServices, LedgerSettings},
};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Fresh ledger with migrations applied and every service wired up.
pub struct TestLedger {
    pub db: Arc<DatabaseConnection>,
    pub services: LedgerServices,
    pub events: mpsc::Receiver<Event>,
}

impl TestLedger {
    pub async fn new() -> Self {
        Self::with_settings(LedgerSettings {
            retry_policy: RetryPolicy::default(),
            default_tax_rate: Decimal::ZERO,
            ..LedgerSettings::default()
        })
        .await
    }

    pub async fn with_settings(settings: LedgerSettings) -> Self {
        Self::with_config(&DbConfig::in_memory(), settings).await
    }

    /// Ledger over an SQLite file in `dir` with a pool of `max_connections`,
    /// so units of work really overlap. `dir` must outlive the ledger.
    pub async fn on_file(dir: &Path, max_connections: u32, settings: LedgerSettings) -> Self {
        let config = DbConfig {
            url: format!("sqlite://{}?mode=rwc", dir.join("ledger.db").display()),
            max_connections,
            min_connections: 1,
            ..DbConfig::default()
        };
        Self::with_config(&config, settings).await
    }

    pub async fn with_config(config: &DbConfig, settings: LedgerSettings) -> Self {
        let pool = db::establish_connection_with_config(config)
            .await
            .expect("failed to open database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations");

        let db = Arc::new(pool);
        let (event_sender, events) = EventSender::channel(4096);
        let services = LedgerServices::new(db.clone(), event_sender, settings);
        Self {
            db,
            services,
            events,
        }
    }

    /// Registers a product with the given opening stock on the legacy counter.
    pub async fn product(&self, barcode: &str, opening_stock: i32) -> product::Model {
        self.services
            .products
            .register_product(RegisterProductCommand {
                barcode: barcode.to_string(),
                name: format!("Item {}", barcode),
                brand: None,
                category: "Grocery".to_string(),
                cost_price: dec!(10.00),
                retail_price: dec!(15.00),
                wholesale_price: None,
                reorder_level: Some(5),
                opening_stock,
                performed_by: None,
            })
            .await
            .expect("failed to register product")
            .product
    }

    /// Receives one batch and returns its id.
    pub async fn batch(
        &self,
        product_id: Uuid,
        quantity: i32,
        expiry: Option<NaiveDate>,
    ) -> i64 {
        self.services
            .inventory
            .restock(restock(product_id, quantity, expiry))
            .await
            .expect("failed to restock")
            .batch_id
    }

    pub async fn stock(&self, product_id: Uuid) -> i32 {
        self.services
            .inventory
            .get_inventory(product_id)
            .await
            .expect("inventory row missing")
            .current_stock
    }

    pub async fn batches(&self, product_id: Uuid) -> Vec<inventory_batch::Model> {
        self.services
            .batch_audit
            .get_batches(product_id)
            .await
            .expect("failed to list batches")
    }

    /// `(batch id, quantity)` pairs in FEFO order.
    pub async fn quantities(&self, product_id: Uuid) -> Vec<(i64, i32)> {
        self.batches(product_id)
            .await
            .into_iter()
            .map(|b| (b.id, b.quantity))
            .collect()
    }

    /// Sum of live batch quantities, for conservation checks.
    pub async fn live_total(&self, product_id: Uuid) -> i32 {
        self.batches(product_id)
            .await
            .iter()
            .filter(|b| b.is_live())
            .map(|b| b.quantity)
            .sum()
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }
        drained
    }
}

pub fn restock(product_id: Uuid, quantity: i32, expiry: Option<NaiveDate>) -> RestockCommand {
    RestockCommand {
        product_id,
        quantity,
        expiry_date: expiry,
        supplier_name: Some("Sta. Maria Foods".to_string()),
        reference: None,
        cost_price: Some(dec!(8.00)),
        reason: None,
        receipt_image: None,
        performed_by: None,
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}
