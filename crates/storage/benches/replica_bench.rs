//! Benchmarks for replica batch writes.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ripple_core::{row, DataType, TableSchema};
use ripple_storage::{Replica, Statement, CHANGE_LOG};

fn create_replica() -> Replica {
    let mut replica = Replica::with_replication_tables();
    replica
        .create_table(
            TableSchema::new("test")
                .column("id", DataType::Int64)
                .column("price", DataType::Float64)
                .column("symbol", DataType::String)
                .primary_key(&["id"])
                .unwrap(),
        )
        .unwrap();
    replica
}

fn upserts(count: i64, version: &str) -> Vec<Statement> {
    let mut batch = Vec::with_capacity(count as usize * 2);
    for i in 1..=count {
        batch.push(Statement::upsert(
            "test",
            row! {
                "id" => i,
                "price" => 100.0 + (i as f64) * 0.1,
                "symbol" => format!("SYM{}", i),
            },
        ));
        batch.push(Statement::upsert(
            CHANGE_LOG,
            row! {
                "stateVersion" => version,
                "table" => "test",
                "rowKeyHash" => format!("{:022}", i),
                "op" => "s",
            },
        ));
    }
    batch
}

/// Benchmark: one transaction's worth of upserts plus change-log rows.
fn replica_batch_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("replica_batch");

    for count in [100i64, 1000, 10000].iter() {
        let batch = upserts(*count, "01");
        group.bench_with_input(BenchmarkId::new("upsert", count), &batch, |b, batch| {
            b.iter_batched(
                create_replica,
                |mut replica| {
                    black_box(replica.execute(batch).unwrap());
                },
                criterion::BatchSize::LargeInput,
            );
        });

        // Truncate purges change-log rows of the same version.
        group.bench_with_input(BenchmarkId::new("truncate", count), &batch, |b, batch| {
            b.iter_batched(
                || {
                    let mut replica = create_replica();
                    replica.execute(batch).unwrap();
                    replica
                },
                |mut replica| {
                    black_box(
                        replica
                            .execute(&[
                                Statement::delete_matching(
                                    CHANGE_LOG,
                                    row! { "stateVersion" => "01", "table" => "test" },
                                ),
                                Statement::truncate("test"),
                            ])
                            .unwrap(),
                    );
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

/// Benchmark: a failing batch that must be rolled back.
fn replica_rollback_benchmark(c: &mut Criterion) {
    let mut batch = upserts(1000, "02");
    batch.push(Statement::insert("test", row! { "id" => 1 }));

    c.bench_function("replica_rollback_1000", |b| {
        b.iter_batched(
            create_replica,
            |mut replica| {
                black_box(replica.execute(&batch).is_err());
                black_box(replica.table("test").map(|t| t.len()));
            },
            criterion::BatchSize::LargeInput,
        );
    });

}

criterion_group!(benches, replica_batch_benchmark, replica_rollback_benchmark);
criterion_main!(benches);
