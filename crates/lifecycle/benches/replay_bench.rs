use std::sync::Arc;

use common::InstanceId;
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{LineItem, Order, OrderId, OrderStatus, ProductId};
use history::{HistoryRecord, HistoryStore, InMemoryHistoryStore, Sequence};
use lifecycle::{
    AcceptingProcessor, ActivityKind, InMemoryInventoryGateway, LifecycleEvent, LifecycleHost,
    LifecycleInstance, LifecycleSignal, OrderActivities,
};
use rust_decimal::Decimal;

fn order(items: usize) -> Order {
    Order::new(
        OrderId::new(),
        (0..items)
            .map(|_| LineItem::new(ProductId::new(), 2, Decimal::new(1999, 2)))
            .collect(),
    )
}

/// A lifecycle parked at PICKED after a few flaky validation attempts.
fn picked_history(instance_id: InstanceId, items: usize) -> Vec<HistoryRecord> {
    let events = vec![
        LifecycleEvent::lifecycle_started(instance_id, "bench", order(items)),
        LifecycleEvent::activity_attempt_failed(ActivityKind::Validate, 1, "503", true),
        LifecycleEvent::activity_attempt_failed(ActivityKind::Validate, 2, "503", true),
        LifecycleEvent::activity_completed(ActivityKind::Validate, None),
        LifecycleEvent::status_changed(OrderStatus::Placed),
        LifecycleEvent::signal_received(LifecycleSignal::Pick),
        LifecycleEvent::signal_consumed(LifecycleSignal::Pick),
        LifecycleEvent::status_changed(OrderStatus::Picked),
        LifecycleEvent::activity_completed(ActivityKind::Process, Some("PROCESSED".into())),
    ];

    events
        .iter()
        .enumerate()
        .map(|(i, event)| {
            event
                .to_record(instance_id, Sequence::new(i as i64 + 1))
                .unwrap()
        })
        .collect()
}

fn bench_fold_history(c: &mut Criterion) {
    let small = picked_history(InstanceId::new(), 1);
    let large = picked_history(InstanceId::new(), 100);

    c.bench_function("lifecycle/fold_history_1_item", |b| {
        b.iter(|| LifecycleInstance::from_history(&small).unwrap());
    });

    c.bench_function("lifecycle/fold_history_100_items", |b| {
        b.iter(|| LifecycleInstance::from_history(&large).unwrap());
    });
}

fn bench_recover_instances(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("lifecycle/recover_50_instances", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryHistoryStore::new();
                for _ in 0..50 {
                    store
                        .append(picked_history(InstanceId::new(), 3), Some(Sequence::empty()))
                        .await
                        .unwrap();
                }

                let activities = OrderActivities::with_gateway(
                    Arc::new(InMemoryInventoryGateway::with_default_stock(10)),
                    Arc::new(AcceptingProcessor::default()),
                );
                let host = LifecycleHost::new(store, activities, "bench");
                host.recover().await.unwrap()
            })
        });
    });
}

criterion_group!(benches, bench_fold_history, bench_recover_instances);
criterion_main!(benches);
