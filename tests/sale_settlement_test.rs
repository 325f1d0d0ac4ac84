mod common;

use assert_matches::assert_matches;
use common::{date, TestLedger};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use stockledger::{
    commands::sales::{PaymentInput, SaleLineInput, SettleSaleCommand},
    entities::PaymentMethod,
    errors::{ErrorKind, ServiceError},
    events::Event,
    services::{respond, LedgerSettings},
};
use uuid::Uuid;

fn line(product_id: Uuid, quantity: i32, unit_price: Decimal) -> SaleLineInput {
    SaleLineInput {
        product_id,
        quantity,
        unit_price,
    }
}

fn cash_sale(items: Vec<SaleLineInput>, tendered: Option<Decimal>) -> SettleSaleCommand {
    SettleSaleCommand {
        items,
        discount: Decimal::ZERO,
        tax_rate: None,
        payment: PaymentInput {
            method: PaymentMethod::Cash,
            amount_tendered: tendered,
            reference: None,
        },
        performed_by: None,
    }
}

#[tokio::test]
async fn short_line_rolls_back_the_whole_sale() {
    let ledger = TestLedger::new().await;
    let plenty = ledger.product("4801001", 0).await;
    let scarce = ledger.product("4801002", 0).await;
    ledger.batch(plenty.id, 10, Some(date(2031, 1, 1))).await;
    ledger.batch(scarce.id, 2, Some(date(2031, 1, 1))).await;

    let err = ledger
        .services
        .sales
        .settle_sale(cash_sale(
            vec![line(plenty.id, 4, dec!(15.00)), line(scarce.id, 3, dec!(20.00))],
            None,
        ))
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::InsufficientStock { product_id, requested: 3, available: 2, .. } if product_id == scarce.id);
    assert_eq!(ledger.stock(plenty.id).await, 10);
    assert_eq!(ledger.live_total(plenty.id).await, 10);
    assert_eq!(ledger.stock(scarce.id).await, 2);

    let movements = ledger
        .services
        .inventory
        .get_movements(plenty.id, 50)
        .await
        .unwrap();
    assert_eq!(movements.len(), 1, "only the restock is on the ledger");
}

#[tokio::test]
async fn totals_capture_price_cost_and_change() {
    let mut ledger = TestLedger::with_settings(LedgerSettings {
        default_tax_rate: dec!(0.12),
        ..LedgerSettings::default()
    })
    .await;
    let sardines = ledger.product("4801003", 0).await;
    let noodles = ledger.product("4801004", 0).await;
    ledger.batch(sardines.id, 10, Some(date(2031, 1, 1))).await;
    ledger.batch(noodles.id, 10, Some(date(2031, 1, 1))).await;
    ledger.drain_events();

    let mut command = cash_sale(
        vec![line(sardines.id, 3, dec!(12.50)), line(noodles.id, 1, dec!(20.25))],
        Some(dec!(100)),
    );
    command.discount = dec!(7.75);
    let receipt = ledger.services.sales.settle_sale(command).await.unwrap();

    assert_eq!(receipt.sale.subtotal, dec!(57.75));
    assert_eq!(receipt.sale.discount, dec!(7.75));
    assert_eq!(receipt.sale.tax, dec!(6.00));
    assert_eq!(receipt.sale.total, dec!(56.00));
    assert_eq!(receipt.payment.amount_tendered, dec!(100));
    assert_eq!(receipt.payment.change_due, dec!(44.00));
    assert!(receipt.sale.receipt_number.starts_with("RCPT-"));

    assert_eq!(receipt.items.len(), 2);
    assert_eq!(receipt.items[0].product_id, sardines.id);
    assert_eq!(receipt.items[0].line_total, dec!(37.50));
    assert_eq!(receipt.items[0].unit_cost, dec!(8.00));
    assert_eq!(receipt.deductions.len(), 2);

    assert_eq!(ledger.stock(sardines.id).await, 7);
    assert_eq!(ledger.stock(noodles.id).await, 9);

    let stored = ledger.services.sales.get_sale(receipt.sale.id).await.unwrap();
    assert_eq!(stored.items.len(), 2);
    assert_eq!(stored.payment.map(|p| p.method), Some(PaymentMethod::Cash));

    let events = ledger.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::CacheInvalidated { .. })));
    assert!(events.iter().any(
        |e| matches!(e, Event::SaleSettled { sale_id, .. } if *sale_id == receipt.sale.id)
    ));
}

#[tokio::test]
async fn rejects_bad_input_before_touching_stock() {
    let ledger = TestLedger::new().await;
    let product = ledger.product("4801005", 0).await;
    ledger.batch(product.id, 5, Some(date(2031, 1, 1))).await;

    let empty = ledger.services.sales.settle_sale(cash_sale(vec![], None)).await;
    assert_eq!(respond(empty).error.unwrap().kind, ErrorKind::Validation);

    let free = ledger
        .services
        .sales
        .settle_sale(cash_sale(vec![line(product.id, 1, dec!(0))], None))
        .await
        .unwrap_err();
    assert_matches!(free, ServiceError::ValidationError(msg) if msg.contains("items[0].unit_price"));

    let unknown = ledger
        .services
        .sales
        .settle_sale(cash_sale(
            vec![line(product.id, 1, dec!(15)), line(Uuid::new_v4(), 1, dec!(15))],
            None,
        ))
        .await
        .unwrap_err();
    assert_matches!(unknown, ServiceError::NotFound(_));

    let underpaid = ledger
        .services
        .sales
        .settle_sale(cash_sale(vec![line(product.id, 2, dec!(15))], Some(dec!(20))))
        .await
        .unwrap_err();
    assert_matches!(underpaid, ServiceError::ValidationError(msg) if msg.contains("amount_tendered"));

    assert_eq!(ledger.stock(product.id).await, 5);
}

#[tokio::test]
async fn electronic_payment_records_exact_amount() {
    let ledger = TestLedger::new().await;
    let product = ledger.product("4801006", 0).await;
    ledger.batch(product.id, 5, None).await;

    let mut command = cash_sale(vec![line(product.id, 2, dec!(15))], None);
    command.payment.method = PaymentMethod::GCash;
    command.payment.reference = Some("  GC-0091823  ".into());
    let receipt = ledger.services.sales.settle_sale(command).await.unwrap();

    assert_eq!(receipt.payment.amount_tendered, dec!(30));
    assert_eq!(receipt.payment.change_due, Decimal::ZERO);
    assert_eq!(receipt.payment.reference.as_deref(), Some("GC-0091823"));
}

#[tokio::test]
async fn mixes_batch_tracked_and_legacy_lines() {
    let ledger = TestLedger::new().await;
    let tracked = ledger.product("4801007", 0).await;
    let legacy = ledger.product("4801008", 6).await;
    ledger.batch(tracked.id, 4, Some(date(2031, 1, 1))).await;

    let receipt = ledger
        .services
        .sales
        .settle_sale(cash_sale(
            vec![line(tracked.id, 4, dec!(15)), line(legacy.id, 5, dec!(15))],
            None,
        ))
        .await
        .unwrap();

    assert!(!receipt.deductions[0].legacy);
    assert!(receipt.deductions[1].legacy);
    assert_eq!(ledger.stock(tracked.id).await, 0);
    assert_eq!(ledger.stock(legacy.id).await, 1);
    // Legacy lines are costed at the product's catalog cost
    assert_eq!(receipt.items[1].unit_cost, dec!(10.00));
}
