mod common;

use assert_matches::assert_matches;
use common::{date, restock, TestLedger};
use stockledger::{
    commands::inventory::{
        AdjustBatchQuantityCommand, AdjustStockCommand, DeleteBatchCommand,
        EditBatchExpiryCommand, ReturnBatchToSupplierCommand, SetReorderLevelCommand,
    },
    entities::{BatchStatus, MovementType},
    errors::ServiceError,
    events::Event,
    services::LedgerSettings,
};

fn adjust_batch(batch_id: i64, change: i32, reason: &str) -> AdjustBatchQuantityCommand {
    AdjustBatchQuantityCommand {
        batch_id,
        quantity_change: change,
        movement_type: None,
        reason: reason.to_string(),
        reference: None,
        performed_by: None,
    }
}

#[tokio::test]
async fn every_audit_operation_requires_a_reason() {
    let ledger = TestLedger::new().await;
    let product = ledger.product("4802001", 0).await;
    let batch = ledger.batch(product.id, 5, Some(date(2031, 1, 1))).await;
    let audit = &ledger.services.batch_audit;

    let short = "ok ";
    assert_matches!(
        audit.adjust_batch_quantity(adjust_batch(batch, -1, short)).await,
        Err(ServiceError::ValidationError(_))
    );
    assert_matches!(
        audit
            .edit_batch_expiry(EditBatchExpiryCommand {
                batch_id: batch,
                expiry_date: None,
                reason: short.into(),
                performed_by: None,
            })
            .await,
        Err(ServiceError::ValidationError(_))
    );
    assert_matches!(
        audit
            .delete_batch(DeleteBatchCommand {
                batch_id: batch,
                reason: "  ".into(),
                performed_by: None,
            })
            .await,
        Err(ServiceError::ValidationError(_))
    );
    assert_matches!(
        audit
            .return_batch_to_supplier(ReturnBatchToSupplierCommand {
                batch_id: batch,
                quantity: None,
                reason: "no".into(),
                reference: None,
                performed_by: None,
            })
            .await,
        Err(ServiceError::ValidationError(_))
    );
    assert_matches!(
        ledger
            .services
            .inventory
            .adjust_stock(AdjustStockCommand {
                product_id: product.id,
                quantity_change: -1,
                movement_type: MovementType::Damage,
                reason: "x".into(),
                reference: None,
                expiry_date: None,
                cost_price: None,
                performed_by: None,
            })
            .await,
        Err(ServiceError::ValidationError(_))
    );

    assert_eq!(ledger.quantities(product.id).await, vec![(batch, 5)]);
}

#[tokio::test]
async fn batch_quantity_cannot_go_negative() {
    let ledger = TestLedger::new().await;
    let product = ledger.product("4802002", 0).await;
    let batch = ledger.batch(product.id, 4, Some(date(2031, 1, 1))).await;
    let audit = &ledger.services.batch_audit;

    let err = audit
        .adjust_batch_quantity(adjust_batch(batch, -5, "Shelf count"))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidAdjustment(_));
    assert_eq!(ledger.stock(product.id).await, 4);

    let change = audit
        .adjust_batch_quantity(adjust_batch(batch, -4, "Shelf count"))
        .await
        .unwrap();
    assert_eq!((change.old_quantity, change.new_quantity, change.new_stock), (4, 0, 0));
    assert_eq!(ledger.batches(product.id).await[0].status, BatchStatus::Depleted);

    // A depleted batch comes back to life when counted up again
    let change = audit
        .adjust_batch_quantity(adjust_batch(batch, 2, "Found behind shelf"))
        .await
        .unwrap();
    assert_eq!(change.new_stock, 2);
    assert_eq!(ledger.batches(product.id).await[0].status, BatchStatus::Active);
    assert_eq!(ledger.live_total(product.id).await, ledger.stock(product.id).await);
}

#[tokio::test]
async fn editing_expiry_reorders_fefo_and_is_logged() {
    let mut ledger = TestLedger::new().await;
    let product = ledger.product("4802003", 0).await;
    let early = ledger.batch(product.id, 3, Some(date(2031, 1, 1))).await;
    let late = ledger.batch(product.id, 3, Some(date(2031, 9, 1))).await;
    ledger.drain_events();

    let edit = ledger
        .services
        .batch_audit
        .edit_batch_expiry(EditBatchExpiryCommand {
            batch_id: late,
            expiry_date: Some(date(2030, 12, 1)),
            reason: "Label misprint".into(),
            performed_by: None,
        })
        .await
        .unwrap();
    assert_eq!(edit.old_expiry, Some(date(2031, 9, 1)));
    assert_eq!(edit.change.new_stock, 6);

    let inventory = ledger.services.inventory.get_inventory(product.id).await.unwrap();
    assert_eq!(inventory.nearest_expiry_date, Some(date(2030, 12, 1)));
    assert_eq!(ledger.quantities(product.id).await, vec![(late, 3), (early, 3)]);

    let history = ledger.services.batch_audit.get_batch_history(late).await.unwrap();
    let logged = history
        .iter()
        .find(|m| m.movement_type == MovementType::Adjustment)
        .expect("expiry edit is on the ledger");
    assert_eq!(logged.quantity_change, 0);
    assert_eq!(logged.reference.as_deref(), Some("expiry:2031-09-01->2030-12-01"));

    assert!(ledger.drain_events().iter().any(|e| matches!(
        e,
        Event::BatchExpiryEdited { batch_id, .. } if *batch_id == late
    )));
}

#[tokio::test]
async fn deleting_a_batch_writes_a_compensating_movement() {
    let ledger = TestLedger::new().await;
    let product = ledger.product("4802004", 0).await;
    let keep = ledger.batch(product.id, 4, Some(date(2031, 1, 1))).await;
    let doomed = ledger.batch(product.id, 6, Some(date(2031, 2, 1))).await;

    let change = ledger
        .services
        .batch_audit
        .delete_batch(DeleteBatchCommand {
            batch_id: doomed,
            reason: "Duplicate receipt".into(),
            performed_by: None,
        })
        .await
        .unwrap();
    assert_eq!(change.new_stock, 4);
    assert_eq!(ledger.quantities(product.id).await, vec![(keep, 4)]);

    // The movement survives its batch
    let history = ledger.services.batch_audit.get_batch_history(doomed).await.unwrap();
    let compensating = history
        .iter()
        .find(|m| m.movement_type == MovementType::Adjustment)
        .expect("compensating movement");
    assert_eq!(compensating.quantity_change, -6);
    assert_eq!((compensating.previous_stock, compensating.new_stock), (10, 4));
    assert_eq!(compensating.reference.as_deref(), Some(format!("delete-batch:{}", doomed).as_str()));

    let again = ledger
        .services
        .batch_audit
        .delete_batch(DeleteBatchCommand {
            batch_id: doomed,
            reason: "Duplicate receipt".into(),
            performed_by: None,
        })
        .await;
    assert_matches!(again, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn supplier_returns_partial_then_full() {
    let ledger = TestLedger::new().await;
    let product = ledger.product("4802005", 0).await;
    let batch = ledger.batch(product.id, 10, Some(date(2031, 1, 1))).await;
    let audit = &ledger.services.batch_audit;

    let partial = audit
        .return_batch_to_supplier(ReturnBatchToSupplierCommand {
            batch_id: batch,
            quantity: Some(4),
            reason: "Dented cans".into(),
            reference: None,
            performed_by: None,
        })
        .await
        .unwrap();
    assert!(!partial.fully_returned);
    assert_eq!(partial.returned_quantity, 4);
    assert_eq!(partial.change.new_stock, 6);
    assert!(partial.reference.starts_with("RET-"));
    assert_eq!(ledger.batches(product.id).await[0].status, BatchStatus::Active);

    let too_many = audit
        .return_batch_to_supplier(ReturnBatchToSupplierCommand {
            batch_id: batch,
            quantity: Some(7),
            reason: "Dented cans".into(),
            reference: None,
            performed_by: None,
        })
        .await;
    assert_matches!(too_many, Err(ServiceError::InvalidAdjustment(_)));

    let full = audit
        .return_batch_to_supplier(ReturnBatchToSupplierCommand {
            batch_id: batch,
            quantity: None,
            reason: "Recall notice".into(),
            reference: Some("RMA-7781".into()),
            performed_by: None,
        })
        .await
        .unwrap();
    assert!(full.fully_returned);
    assert_eq!(full.returned_quantity, 6);
    assert_eq!(full.reference, "RMA-7781");
    assert_eq!(ledger.stock(product.id).await, 0);

    let batches = ledger.batches(product.id).await;
    assert_eq!(batches[0].status, BatchStatus::ReturnedToSupplier);
    assert_eq!(batches[0].quantity, 0);

    // Returned batches are frozen
    assert_matches!(
        audit
            .adjust_batch_quantity(adjust_batch(batch, 1, "Miscount"))
            .await,
        Err(ServiceError::InvalidAdjustment(_))
    );

    let history = audit.get_batch_history(batch).await.unwrap();
    let mut returns: Vec<i32> = history
        .iter()
        .filter(|m| m.movement_type == MovementType::SupplierReturn)
        .map(|m| m.quantity_change)
        .collect();
    returns.sort();
    assert_eq!(returns, vec![-6, -4]);
}

#[tokio::test]
async fn adjust_stock_draws_fefo_and_opens_batches() {
    let ledger = TestLedger::new().await;
    let product = ledger.product("4802006", 0).await;
    let a = ledger.batch(product.id, 2, Some(date(2031, 1, 1))).await;
    let b = ledger.batch(product.id, 5, Some(date(2031, 4, 1))).await;
    let inventory = &ledger.services.inventory;

    let damage = inventory
        .adjust_stock(AdjustStockCommand {
            product_id: product.id,
            quantity_change: -3,
            movement_type: MovementType::Damage,
            reason: "Water damage".into(),
            reference: None,
            expiry_date: None,
            cost_price: None,
            performed_by: None,
        })
        .await
        .unwrap();
    assert_eq!(damage.movement_ids.len(), 2);
    assert_eq!(damage.new_stock, 4);
    assert_eq!(ledger.quantities(product.id).await, vec![(a, 0), (b, 4)]);

    let too_much = inventory
        .adjust_stock(AdjustStockCommand {
            product_id: product.id,
            quantity_change: -5,
            movement_type: MovementType::InternalUse,
            reason: "Staff meal".into(),
            reference: None,
            expiry_date: None,
            cost_price: None,
            performed_by: None,
        })
        .await;
    assert_matches!(too_much, Err(ServiceError::InvalidAdjustment(_)));

    let wrong_sign = inventory
        .adjust_stock(AdjustStockCommand {
            product_id: product.id,
            quantity_change: 2,
            movement_type: MovementType::Damage,
            reason: "Water damage".into(),
            reference: None,
            expiry_date: None,
            cost_price: None,
            performed_by: None,
        })
        .await;
    assert_matches!(wrong_sign, Err(ServiceError::ValidationError(_)));

    let returned = inventory
        .adjust_stock(AdjustStockCommand {
            product_id: product.id,
            quantity_change: 3,
            movement_type: MovementType::Return,
            reason: "Customer return".into(),
            reference: None,
            expiry_date: Some(date(2031, 2, 1)),
            cost_price: None,
            performed_by: None,
        })
        .await
        .unwrap();
    assert_eq!(returned.new_stock, 7);
    assert_eq!(ledger.batches(product.id).await.len(), 3);
    assert_eq!(ledger.live_total(product.id).await, 7);
}

#[tokio::test]
async fn first_restock_of_legacy_stock_opens_a_balance_batch() {
    let ledger = TestLedger::new().await;
    let product = ledger.product("4802007", 12).await;

    let result = ledger
        .services
        .inventory
        .restock(restock(product.id, 6, Some(date(2031, 1, 1))))
        .await
        .unwrap();
    assert_eq!(result.new_stock, 18);

    let batches = ledger.batches(product.id).await;
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].expiry_date, Some(date(2031, 1, 1)));
    assert_eq!(batches[1].expiry_date, None);
    assert_eq!(batches[1].quantity, 12);

    let inventory = ledger.services.inventory.get_inventory(product.id).await.unwrap();
    assert!(inventory.batch_tracked);
    assert_eq!(inventory.current_stock, ledger.live_total(product.id).await);

    let movements = ledger
        .services
        .inventory
        .get_movements(product.id, 10)
        .await
        .unwrap();
    assert!(movements.iter().any(|m| m.movement_type == MovementType::Restock));
}

#[tokio::test]
async fn alerts_and_reorder_levels() {
    let ledger = TestLedger::new().await;
    let empty = ledger.product("4802008", 0).await;
    let low = ledger.product("4802009", 0).await;
    let fine = ledger.product("4802010", 0).await;
    ledger.batch(low.id, 3, Some(date(2031, 1, 1))).await;
    let soon = ledger
        .batch(fine.id, 40, Some(chrono::Utc::now().date_naive() + chrono::Duration::days(5)))
        .await;

    let alerts = ledger.services.inventory.get_inventory_alerts().await.unwrap();
    assert!(alerts.out_of_stock.iter().any(|a| a.product_id == empty.id));
    assert!(alerts.low_stock.iter().any(|a| a.product_id == low.id));
    assert!(!alerts.low_stock.iter().any(|a| a.product_id == fine.id));
    let expiring = alerts
        .expiring_soon
        .iter()
        .find(|b| b.batch_id == soon)
        .expect("batch within the warning window");
    assert_eq!(expiring.days_left, 5);
    assert!(!expiring.expired);

    ledger
        .services
        .inventory
        .set_reorder_level(SetReorderLevelCommand {
            product_id: low.id,
            reorder_level: 2,
        })
        .await
        .unwrap();
    let alerts = ledger.services.inventory.get_inventory_alerts().await.unwrap();
    assert!(!alerts.low_stock.iter().any(|a| a.product_id == low.id));
}

#[tokio::test]
async fn reconcile_reports_no_drift_on_a_clean_product() {
    let ledger = TestLedger::new().await;
    let product = ledger.product("4802011", 0).await;
    ledger.batch(product.id, 7, Some(date(2031, 1, 1))).await;

    let first = ledger.services.inventory.reconcile_product(product.id).await.unwrap();
    let second = ledger.services.inventory.reconcile_product(product.id).await.unwrap();
    assert!(!first.drifted);
    assert_eq!(first, second);
    assert_eq!(second.current_stock, 7);
}

#[tokio::test]
async fn receipts_that_overflow_the_stock_counter_roll_back() {
    let ledger = TestLedger::new().await;
    let product = ledger.product("4802012", 0).await;
    ledger.batch(product.id, i32::MAX, Some(date(2031, 1, 1))).await;
    let inventory = &ledger.services.inventory;

    assert_matches!(
        inventory.restock(restock(product.id, 1, None)).await,
        Err(ServiceError::InvalidAdjustment(_))
    );
    assert_matches!(
        inventory
            .adjust_stock(AdjustStockCommand {
                product_id: product.id,
                quantity_change: 1,
                movement_type: MovementType::Return,
                reason: "Customer return".into(),
                reference: None,
                expiry_date: None,
                cost_price: None,
                performed_by: None,
            })
            .await,
        Err(ServiceError::InvalidAdjustment(_))
    );

    assert_eq!(ledger.stock(product.id).await, i32::MAX);
    assert_eq!(ledger.batches(product.id).await.len(), 1);
    let movements = inventory.get_movements(product.id, 10).await.unwrap();
    assert_eq!(movements.len(), 1);
}

#[tokio::test]
async fn unbounded_expiry_window_reports_every_dated_batch() {
    let ledger = TestLedger::with_settings(LedgerSettings {
        expiry_warning_days: i64::MAX,
        ..LedgerSettings::default()
    })
    .await;
    let product = ledger.product("4802013", 0).await;
    let dated = ledger.batch(product.id, 4, Some(date(2099, 12, 31))).await;
    ledger.batch(product.id, 4, None).await;

    let alerts = ledger.services.inventory.get_inventory_alerts().await.unwrap();
    let expiring: Vec<i64> = alerts.expiring_soon.iter().map(|b| b.batch_id).collect();
    assert_eq!(expiring, vec![dated]);
}
