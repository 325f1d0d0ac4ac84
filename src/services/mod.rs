// Ledger services
pub mod batch_audit;
pub mod inventory;
pub mod products;
pub mod sales;

use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::RetryPolicy;
use crate::errors::ServiceError;
use crate::events::EventSender;
use crate::LedgerResponse;

pub use batch_audit::BatchAuditService;
pub use inventory::{ExpiringBatch, InventoryAlerts, InventoryService, StockAlert};
pub use products::ProductService;
pub use sales::{SaleDetails, SalesService};

/// Tunables the services read from configuration.
#[derive(Debug, Clone)]
pub struct LedgerSettings {
    pub retry_policy: RetryPolicy,
    pub default_tax_rate: Decimal,
    pub default_reorder_level: i32,
    pub expiry_warning_days: i64,
    pub movement_query_max_limit: u64,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            retry_policy: RetryPolicy::default(),
            default_tax_rate: Decimal::ZERO,
            default_reorder_level: 10,
            expiry_warning_days: 30,
            movement_query_max_limit: 1000,
        }
    }
}

impl From<&AppConfig> for LedgerSettings {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            retry_policy: RetryPolicy::from(cfg),
            default_tax_rate: cfg.tax_rate(),
            default_reorder_level: cfg.default_reorder_level,
            expiry_warning_days: cfg.expiry_warning_days,
            movement_query_max_limit: cfg.movement_query_max_limit,
        }
    }
}

/// Every service, sharing one pool and one event channel.
#[derive(Clone)]
pub struct LedgerServices {
    pub products: ProductService,
    pub inventory: InventoryService,
    pub batch_audit: BatchAuditService,
    pub sales: SalesService,
}

impl LedgerServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        settings: LedgerSettings,
    ) -> Self {
        Self {
            products: ProductService::new(db.clone(), event_sender.clone(), settings.clone()),
            inventory: InventoryService::new(db.clone(), event_sender.clone(), settings.clone()),
            batch_audit: BatchAuditService::new(db.clone(), event_sender.clone(), settings.clone()),
            sales: SalesService::new(db, event_sender, settings),
        }
    }
}

/// Converts a service outcome into the structured answer handed to callers.
pub fn respond<T>(result: Result<T, ServiceError>) -> LedgerResponse<T> {
    LedgerResponse::from_result(result)
}
