use criterion::{Criterion, criterion_group, criterion_main};
use domain::ChangeAction;

#[path = "../tests/support/mod.rs"]
mod support;

use support::{Kind, Node, Recorder, SaveOther, harness};

fn bench_save_with_tracked_entities(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let h = harness(|_, _| {});

    c.bench_function("uow/save_10_tracked", |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut delivery = Node::created(Kind::Delivery, "d1");
                for line in 0..10 {
                    delivery = delivery.track(
                        Kind::DeliveryItem,
                        &format!("i{line}"),
                        ChangeAction::Created,
                    );
                }

                let mut uow = h.unit_of_work();
                uow.begin().await.unwrap();
                uow.save(&mut delivery).await.unwrap();
                uow.rollback().await.unwrap();
            });
            h.journal.clear();
        });
    });
}

fn bench_nested_dispatch(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let h = harness(|bus, journal| {
        bus.register(SaveOther {
            event: "DeliveryCompleted",
            kind: Kind::Product,
            key: "p1",
            emits: vec!["StockAdjusted"],
        });
        bus.register(Recorder {
            event: "StockAdjusted",
            label: "StockAdjusted",
            journal: journal.clone(),
        });
    });

    c.bench_function("uow/save_nested_dispatch", |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut delivery =
                    Node::created(Kind::Delivery, "d1").emit("DeliveryCompleted");

                let mut uow = h.unit_of_work();
                uow.begin().await.unwrap();
                uow.save(&mut delivery).await.unwrap();
                uow.rollback().await.unwrap();
            });
            h.journal.clear();
        });
    });
}

fn bench_managed_transaction(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let h = harness(|_, _| {});

    c.bench_function("uow/run_and_commit", |b| {
        let mut n = 0u64;
        b.iter(|| {
            n += 1;
            let account = Node::created(Kind::Account, &format!("a{n}"));
            rt.block_on(async {
                h.manager
                    .run(move |uow| {
                        Box::pin(async move {
                            let mut account = account;
                            uow.save(&mut account).await
                        })
                    })
                    .await
                    .unwrap();
            });
            h.journal.clear();
        });
    });
}

criterion_group!(
    benches,
    bench_save_with_tracked_entities,
    bench_nested_dispatch,
    bench_managed_transaction
);
criterion_main!(benches);
