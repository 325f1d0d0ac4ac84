use chrono::{Duration, NaiveDate, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rust_decimal_macros::dec;
use stockledger::entities::{inventory_batch, BatchStatus};
use stockledger::ledger::fefo::{plan_deduction, sort_fefo};
use stockledger::ledger::stock_aggregator::aggregate;
use uuid::Uuid;

fn batches(count: usize) -> Vec<inventory_batch::Model> {
    let received = Utc.with_ymd_and_hms(2030, 1, 1, 8, 0, 0).unwrap();
    let base = NaiveDate::from_ymd_opt(2030, 6, 1).unwrap();
    (0..count)
        .map(|i| {
            let id = i as i64 + 1;
            inventory_batch::Model {
                id,
                product_id: Uuid::nil(),
                quantity: 5 + (i % 7) as i32,
                // Every fifth batch never expires; the rest are scattered
                expiry_date: (i % 5 != 0).then(|| base + Duration::days(((i * 37) % 365) as i64)),
                received_date: received + Duration::hours(id),
                supplier_name: None,
                supplier_reference: None,
                cost_price: Some(dec!(12.50)),
                document_reference: None,
                status: BatchStatus::Active,
                created_at: received,
                updated_at: received,
            }
        })
        .collect()
}

// Benchmark for planning a deduction across many batches
fn plan_deduction_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("fefo_plan");
    let today = NaiveDate::from_ymd_opt(2030, 7, 1).unwrap();

    for size in [10usize, 100, 1_000].iter() {
        let input = batches(*size);
        let half = aggregate(&input).unwrap().current_stock / 2;
        group.bench_with_input(BenchmarkId::from_parameter(size), &input, |b, input| {
            b.iter(|| plan_deduction(black_box(input), black_box(half.max(1)), today));
        });
    }

    group.finish();
}

// Benchmark for FEFO sorting and aggregate recomputation
fn sort_and_aggregate_benchmark(c: &mut Criterion) {
    let input = batches(1_000);

    c.bench_function("fefo_sort_1000", |b| {
        b.iter(|| {
            let mut copy = input.clone();
            sort_fefo(&mut copy);
            black_box(copy)
        });
    });

    c.bench_function("aggregate_1000", |b| {
        b.iter(|| black_box(aggregate(black_box(&input)).unwrap()));
    });
}

criterion_group!(benches, plan_deduction_benchmark, sort_and_aggregate_benchmark);
criterion_main!(benches);
