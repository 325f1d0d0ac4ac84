//! Stockledger Library
//!
//! Batch-tracked inventory ledger for retail point of sale: deliveries are
//! received as expiry-dated batches, sales draw them down First-Expired-First-Out,
//! and every quantity change lands in an append-only movement ledger.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod commands;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod migrator;
pub mod services;

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorBody, ServiceError};

/// Structured answer returned at the boundary of every operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl<T> LedgerResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: &ServiceError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorBody::from(error)),
        }
    }

    pub fn from_result(result: Result<T, ServiceError>) -> Self {
        match result {
            Ok(data) => Self::success(data),
            Err(e) => Self::failure(&e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use uuid::Uuid;

    #[test]
    fn failure_carries_kind_and_caller_message() {
        let err = ServiceError::InsufficientStock {
            product_id: Uuid::nil(),
            product: "Sardines 155g".into(),
            requested: 20,
            available: 8,
        };
        let response: LedgerResponse<()> = LedgerResponse::from_result(Err(err));
        assert!(!response.success);
        let body = response.error.unwrap();
        assert_eq!(body.kind, ErrorKind::InsufficientStock);
        assert!(body.message.contains("Sardines 155g"));
        assert!(body.message.contains("12"));
    }

    #[test]
    fn success_serializes_without_error_field() {
        let json = serde_json::to_value(LedgerResponse::success(5)).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "data": 5}));
    }
}
