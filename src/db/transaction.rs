use crate::config::AppConfig;
use crate::errors::ServiceError;
use metrics::{counter, histogram};
use sea_orm::{
    AccessMode, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend,
    IsolationLevel, TransactionTrait,
};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

/// How often a unit of work is replayed after a serialization conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(25),
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    /// Linear backoff before the given (1-based) retry attempt.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        self.backoff * attempt.saturating_sub(1)
    }
}

impl From<&AppConfig> for RetryPolicy {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            max_attempts: cfg.retry_max_attempts.max(1),
            backoff: cfg.retry_backoff(),
        }
    }
}

/// One open transaction. Dropping it without calling [`UnitOfWork::commit`]
/// rolls it back.
pub struct UnitOfWork {
    txn: DatabaseTransaction,
    id: Uuid,
    label: &'static str,
    started: Instant,
}

impl UnitOfWork {
    /// Opens a read-committed, read-write transaction.
    pub async fn begin(db: &DatabaseConnection, label: &'static str) -> Result<Self, ServiceError> {
        let txn = match db.get_database_backend() {
            // SQLite has a single isolation level and rejects the SET TRANSACTION statement
            DbBackend::Sqlite => db.begin().await?,
            _ => {
                db.begin_with_config(
                    Some(IsolationLevel::ReadCommitted),
                    Some(AccessMode::ReadWrite),
                )
                .await?
            }
        };
        let id = Uuid::new_v4();
        debug!(transaction_id = %id, operation = label, "Starting unit of work");
        counter!("stockledger_db.transaction.started", 1, "operation" => label);

        Ok(Self {
            txn,
            id,
            label,
            started: Instant::now(),
        })
    }

    pub fn txn(&self) -> &DatabaseTransaction {
        &self.txn
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn commit(self) -> Result<(), ServiceError> {
        let Self {
            txn,
            id,
            label,
            started,
        } = self;
        txn.commit().await?;

        let elapsed = started.elapsed();
        histogram!("stockledger_db.transaction.duration", elapsed, "operation" => label);
        counter!("stockledger_db.transaction.committed", 1, "operation" => label);
        debug!(transaction_id = %id, operation = label, "Unit of work committed in {:?}", elapsed);
        Ok(())
    }

    pub async fn rollback(self) -> Result<(), ServiceError> {
        let Self {
            txn,
            id,
            label,
            started,
        } = self;
        let result = txn.rollback().await.map_err(ServiceError::db_error);

        counter!("stockledger_db.transaction.rolled_back", 1, "operation" => label);
        warn!(
            transaction_id = %id,
            operation = label,
            "Unit of work rolled back after {:?}",
            started.elapsed()
        );
        result
    }
}

/// True when the backend honours `SELECT ... FOR UPDATE`.
pub fn supports_row_locks<C: ConnectionTrait>(conn: &C) -> bool {
    !matches!(conn.get_database_backend(), DbBackend::Sqlite)
}
