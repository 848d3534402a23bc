//! Basic usage example
//!
//! This example demonstrates the basic usage of tempoq:
//! - Creating a queue with concurrency control
//! - Submitting prioritized tasks
//! - Receiving results and awaiting idle

use async_trait::async_trait;
use std::time::Duration;
use tempoq::{QueueConfig, Result, Task, TaskOptions, TaskQueue};
use tokio_util::sync::CancellationToken;

/// A simple task that greets someone
struct GreetTask {
    name: String,
}

#[async_trait]
impl Task for GreetTask {
    async fn run(&self, _cancel: CancellationToken) -> Result<serde_json::Value> {
        // Simulate some work
        tokio::time::sleep(Duration::from_millis(100)).await;

        Ok(serde_json::json!({
            "greeting": format!("Hello, {}!", self.name),
            "timestamp": chrono::Utc::now().to_rfc3339()
        }))
    }

    fn task_type(&self) -> &str {
        "greet"
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    println!("=== tempoq: Basic Usage Example ===\n");

    // At most two greetings in flight at once
    let queue = TaskQueue::new(QueueConfig::new().with_concurrency(2))?;
    println!("✓ Queue created with concurrency 2\n");

    println!("Submitting tasks...");
    let names = vec![("Alice", 0), ("Bob", 0), ("Charlie", 5)];
    let mut receivers = Vec::new();

    for (name, priority) in names {
        let task = Box::new(GreetTask {
            name: name.to_string(),
        });
        let rx = queue
            .add_with(task, TaskOptions::default().with_priority(priority))
            .await;
        receivers.push((name, rx));

        println!("  → Submitted greeting for {} (priority {})", name, priority);
    }

    println!("\nCollecting results...");
    for (name, rx) in receivers {
        let value = rx.await??;
        println!("  ← {}: {}", name, value["greeting"]);
    }

    queue.on_idle().await;
    println!("\n✓ Queue idle, all done");

    Ok(())
}
