mod common;

use std::time::Duration;

use common::{date, TestLedger};
use rust_decimal_macros::dec;
use stockledger::{
    commands::sales::{PaymentInput, SaleLineInput, SettleSaleCommand},
    db::RetryPolicy,
    entities::{MovementType, PaymentMethod},
    errors::ServiceError,
    ledger::MovementFilter,
    services::LedgerSettings,
};
use uuid::Uuid;

fn one_unit_sale(product_id: Uuid) -> SettleSaleCommand {
    SettleSaleCommand {
        items: vec![SaleLineInput {
            product_id,
            quantity: 1,
            unit_price: dec!(15.00),
        }],
        discount: dec!(0),
        tax_rate: None,
        payment: PaymentInput {
            method: PaymentMethod::Cash,
            amount_tendered: None,
            reference: None,
        },
        performed_by: None,
    }
}

async fn sale_movements(ledger: &TestLedger, product_id: Uuid) -> u64 {
    let (_, total) = ledger
        .services
        .inventory
        .get_all_movements(MovementFilter {
            product_id: Some(product_id),
            movement_type: Some(MovementType::Sale),
            ..MovementFilter::default()
        })
        .await
        .unwrap();
    total
}

// Twenty checkouts race for ten units spread over two batches; exactly ten
// may win and no batch may end up negative.
#[tokio::test]
async fn concurrent_sales_never_oversell() {
    let ledger = TestLedger::new().await;
    let product = ledger.product("4803001", 0).await;
    ledger.batch(product.id, 4, Some(date(2031, 1, 1))).await;
    ledger.batch(product.id, 6, Some(date(2031, 5, 1))).await;

    let mut tasks = vec![];
    for _ in 0..20 {
        let sales = ledger.services.sales.clone();
        let command = one_unit_sale(product.id);
        tasks.push(tokio::spawn(async move { sales.settle_sale(command).await }));
    }

    let mut success = 0;
    let mut short = 0;
    for task in tasks {
        match task.await.expect("task panicked") {
            Ok(_) => success += 1,
            Err(ServiceError::InsufficientStock { .. }) => short += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(success, 10, "exactly 10 sales should succeed; got {}", success);
    assert_eq!(short, 10);

    assert_eq!(ledger.stock(product.id).await, 0);
    assert!(ledger.batches(product.id).await.iter().all(|b| b.quantity == 0));

    assert_eq!(sale_movements(&ledger, product.id).await, 10);
}

// Same race over a file-backed pool of several connections, so transactions
// interleave and the losers see SQLITE_BUSY. Conflicts are replayed; one
// that exhausts its attempts must leave nothing behind.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overlapping_sales_on_a_shared_file_never_oversell() {
    let dir = tempfile::tempdir().expect("temp dir");
    let ledger = TestLedger::on_file(
        dir.path(),
        4,
        LedgerSettings {
            retry_policy: RetryPolicy {
                max_attempts: 20,
                backoff: Duration::from_millis(2),
            },
            ..LedgerSettings::default()
        },
    )
    .await;
    let product = ledger.product("4803003", 0).await;
    ledger.batch(product.id, 4, Some(date(2031, 1, 1))).await;
    ledger.batch(product.id, 6, Some(date(2031, 5, 1))).await;

    let mut tasks = vec![];
    for _ in 0..20 {
        let sales = ledger.services.sales.clone();
        let command = one_unit_sale(product.id);
        tasks.push(tokio::spawn(async move { sales.settle_sale(command).await }));
    }

    let mut success = 0;
    for task in tasks {
        match task.await.expect("task panicked") {
            Ok(receipt) => {
                assert_eq!(receipt.deductions.len(), 1);
                success += 1;
            }
            Err(ServiceError::InsufficientStock { .. })
            | Err(ServiceError::ConcurrencyConflict(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert!((1..=10).contains(&success), "got {} sales", success);

    let batches = ledger.batches(product.id).await;
    assert!(batches.iter().all(|b| b.quantity >= 0));
    assert_eq!(ledger.stock(product.id).await, 10 - success);
    assert_eq!(ledger.live_total(product.id).await, 10 - success);
    assert_eq!(sale_movements(&ledger, product.id).await, success as u64);
}

#[tokio::test]
async fn concurrent_restocks_and_sales_conserve_stock() {
    let ledger = TestLedger::new().await;
    let product = ledger.product("4803002", 0).await;
    ledger.batch(product.id, 5, Some(date(2031, 1, 1))).await;

    let mut tasks = vec![];
    for i in 0..10 {
        let inventory = ledger.services.inventory.clone();
        let product_id = product.id;
        tasks.push(tokio::spawn(async move {
            if i % 2 == 0 {
                inventory
                    .restock(common::restock(product_id, 2, Some(date(2031, 2, 1 + i as u32))))
                    .await
                    .map(|_| ())
            } else {
                let result = inventory.deduct_for_sale(product_id, 3, None).await;
                if result.success {
                    Ok(())
                } else {
                    Err(ServiceError::InternalError(result.error.unwrap_or_default()))
                }
            }
        }));
    }
    for task in tasks {
        let _ = task.await.expect("task panicked");
    }

    assert_eq!(ledger.stock(product.id).await, ledger.live_total(product.id).await);
    let report = ledger.services.inventory.reconcile_product(product.id).await.unwrap();
    assert!(!report.drifted);
}
