//! Rate limiting example
//!
//! This example demonstrates the two rate-limit modes:
//! - fixed window: cheap, resets the admission count at window boundaries
//! - strict (sliding) window: caps admissions over every rolling interval
//!
//! It also shows the rate-limit lifecycle events.

use std::time::{Duration, Instant};
use tempoq::{events, FnTask, QueueConfig, Task, TaskQueue};

fn stamp_task(label: &str, started: Instant) -> Box<dyn Task> {
    let label = label.to_string();
    Box::new(FnTask::new(move |_cancel| {
        let label = label.clone();
        async move {
            println!("  [{:>5} ms] {} running", started.elapsed().as_millis(), label);
            Ok(serde_json::json!(label))
        }
    }))
}

async fn run_queue(queue: TaskQueue, count: usize) -> anyhow::Result<()> {
    let started = Instant::now();

    // Watch the rate-limit transitions while tasks flow through
    let mut rate_events = queue.subscribe_filtered(|e| {
        e.key == events::QUEUE_RATE_LIMITED || e.key == events::QUEUE_RATE_CLEARED
    });
    let watcher = tokio::spawn(async move {
        while let Some(event) = rate_events.recv().await {
            println!("  [event] {}", event.key);
        }
    });

    for i in 0..count {
        let _rx = queue.add(stamp_task(&format!("task-{i}"), started)).await;
    }

    queue.on_idle().await;
    watcher.abort();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    println!("=== tempoq: Rate Limiting Example ===\n");

    println!("Fixed window: 2 admissions per 500ms");
    let fixed = TaskQueue::new(
        QueueConfig::new().with_rate_limit(2, Duration::from_millis(500)),
    )?;
    run_queue(fixed, 6).await?;

    println!("\nStrict window: 2 admissions in every rolling 500ms");
    let strict = TaskQueue::new(
        QueueConfig::new()
            .strict()
            .with_rate_limit(2, Duration::from_millis(500)),
    )?;
    run_queue(strict, 6).await?;

    println!("\n✓ Done");
    Ok(())
}
