use crate::db::{RetryPolicy, UnitOfWork};
use crate::errors::ServiceError;
use async_trait::async_trait;
use metrics::counter;
use sea_orm::{DatabaseConnection, DatabaseTransaction};
use tracing::{instrument, warn};

pub mod inventory;
pub mod products;
pub mod sales;

/// Command trait for implementing the Command Pattern
///
/// A command holds everything one unit of work needs. [`execute`] validates it,
/// runs it inside a single transaction and commits only when it succeeds, so a
/// command never has to commit or roll back on its own.
#[async_trait]
pub trait Command: Send + Sync {
    /// The return type of the command when executed successfully
    type Result: Send;

    /// Operation label used in logs and metrics.
    const NAME: &'static str;

    /// Input checks that need no database access. Runs once, before the first
    /// transaction is opened.
    fn validate_input(&self) -> Result<(), ServiceError> {
        Ok(())
    }

    /// Performs the work on the open transaction.
    async fn execute(&self, txn: &DatabaseTransaction) -> Result<Self::Result, ServiceError>;
}

/// Runs `command` as one all-or-nothing unit of work.
///
/// The transaction commits on `Ok` and rolls back on `Err`. A concurrency
/// conflict replays the whole command on a fresh transaction, up to
/// `policy.max_attempts` times in total.
#[instrument(skip(db, command), fields(command = C::NAME))]
pub async fn execute<C: Command>(
    db: &DatabaseConnection,
    policy: RetryPolicy,
    command: &C,
) -> Result<C::Result, ServiceError> {
    command.validate_input()?;

    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let outcome = run_once(db, command).await;
        match outcome {
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                attempt += 1;
                counter!("stockledger.unit_of_work.retries", 1, "operation" => C::NAME);
                warn!(attempt, max_attempts, error = %e, "Concurrency conflict, replaying unit of work");
                tokio::time::sleep(policy.delay_before(attempt)).await;
            }
            Err(e) => {
                if e.is_retryable() {
                    counter!("stockledger.unit_of_work.conflicts_exhausted", 1, "operation" => C::NAME);
                }
                return Err(e);
            }
            Ok(value) => return Ok(value),
        }
    }
}

async fn run_once<C: Command>(
    db: &DatabaseConnection,
    command: &C,
) -> Result<C::Result, ServiceError> {
    let uow = UnitOfWork::begin(db, C::NAME).await?;
    match command.execute(uow.txn()).await {
        Ok(value) => {
            uow.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_error) = uow.rollback().await {
                warn!(error = %rollback_error, "Rollback failed; the connection drops the transaction");
            }
            Err(e)
        }
    }
}
