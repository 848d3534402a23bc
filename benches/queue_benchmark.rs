//! Performance benchmarks for tempoq
//!
//! Run with: cargo bench

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;
use tempoq::{FnTask, QueueConfig, Task, TaskQueue};
use tokio::runtime::Runtime;

/// A minimal task for measuring queue overhead
fn noop_task(id: usize) -> Box<dyn Task> {
    Box::new(FnTask::new(move |_cancel| async move {
        Ok(serde_json::json!({ "id": id }))
    }))
}

/// A task with simulated work
fn work_task(id: usize, work_us: u64) -> Box<dyn Task> {
    Box::new(FnTask::new(move |_cancel| async move {
        tokio::time::sleep(Duration::from_micros(work_us)).await;
        Ok(serde_json::json!({ "id": id }))
    }))
}

fn bench_submit_throughput(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("submit_throughput");

    for size in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.to_async(&rt).iter(|| async move {
                let queue = TaskQueue::new(QueueConfig::new().with_concurrency(10)).unwrap();

                let mut receivers = Vec::new();
                for i in 0..size {
                    receivers.push(queue.add(noop_task(i)).await);
                }

                for rx in receivers {
                    let _ = rx.await;
                }

                queue.on_idle().await;
            });
        });
    }

    group.finish();
}

fn bench_concurrent_execution(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("concurrent_execution");

    for concurrency in [1, 5, 10, 20].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(concurrency),
            concurrency,
            |b, &concurrency| {
                b.to_async(&rt).iter(|| async move {
                    let queue =
                        TaskQueue::new(QueueConfig::new().with_concurrency(concurrency)).unwrap();

                    let mut receivers = Vec::new();
                    for i in 0..100 {
                        receivers.push(queue.add(work_task(i, 100)).await);
                    }

                    for rx in receivers {
                        let _ = rx.await;
                    }

                    queue.on_idle().await;
                });
            },
        );
    }

    group.finish();
}

fn bench_priority_insertion(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("priority_insertion");

    for size in [100, 1000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.to_async(&rt).iter(|| async move {
                // Paused, so everything lands in the waiting queue with
                // interleaved priorities before a single drain
                let queue = TaskQueue::new(QueueConfig::new().with_concurrency(10).paused())
                    .unwrap();

                for i in 0..size {
                    let options =
                        tempoq::TaskOptions::default().with_priority((i % 7) as i32 - 3);
                    let _rx = queue.add_with(noop_task(i), options).await;
                }

                queue.start().await;
                queue.on_idle().await;
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_submit_throughput,
    bench_concurrent_execution,
    bench_priority_insertion
);
criterion_main!(benches);
