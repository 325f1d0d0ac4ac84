//! Batch-tracked stock ledger.
//!
//! Every function here takes a [`sea_orm::ConnectionTrait`] and is meant to run
//! on the transaction of a unit of work; none of them commit.

pub mod batch_store;
pub mod fefo;
pub mod movement_ledger;
pub mod stock_aggregator;

pub use fefo::{BatchConsumption, Deduction, DeductionResult, MovementContext};
pub use movement_ledger::MovementFilter;
pub use stock_aggregator::StockAggregate;

use crate::errors::ServiceError;

/// Minimum trimmed length, in characters, of an operator reason.
pub const MIN_REASON_CHARS: usize = 3;

/// Returns the trimmed reason, or a validation error naming `field`.
pub fn require_reason(field: &str, reason: Option<&str>) -> Result<String, ServiceError> {
    let trimmed = reason.map(str::trim).unwrap_or_default();
    if trimmed.chars().count() < MIN_REASON_CHARS {
        return Err(ServiceError::validation(
            field,
            format!("must be at least {} characters", MIN_REASON_CHARS),
        ));
    }
    Ok(trimmed.to_string())
}

/// Trims optional free text and turns blanks into `None`.
pub fn clean_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
