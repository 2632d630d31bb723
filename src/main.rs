//! Queue Worker CLI
//!
//! Runs the polling worker, and offers `enqueue` / `peek` for operating on
//! the request queue by hand.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use queue_worker::handlers::default_registry;
use queue_worker::storage::{
    BlobClient, QueueClient, QueueService, StorageTransport, MAX_PEEK_COUNT,
};
use queue_worker::worker::{
    connection_string_from_env, setup_signal_handler, QueueWorker, WorkerConfig,
};
use queue_worker::JobRunner;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "queue-worker")]
#[command(about = "Pull jobs from a storage queue, run them, and upload their logs to blob storage")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run as worker, polling the request queue for jobs
    Worker {
        /// Poll interval in seconds (default: 5)
        #[arg(short, long, default_value = "5")]
        poll_interval: u64,

        /// Queue to poll
        #[arg(short, long, default_value = "demo1")]
        queue: String,

        /// Maximum jobs running at once
        #[arg(long, default_value = "4")]
        max_jobs: usize,

        /// Handler for payloads that do not name one
        #[arg(long, default_value = "echo")]
        handler: String,

        /// Run once and exit (for testing)
        #[arg(long)]
        once: bool,
    },

    /// Put a message on a queue
    Enqueue {
        /// Target queue
        #[arg(short, long, default_value = "demo1")]
        queue: String,

        /// Message text
        #[arg(short, long, conflicts_with = "file", required_unless_present = "file")]
        message: Option<String>,

        /// Read the message text from a file
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Show visible messages without taking them
    Peek {
        /// Queue to inspect
        #[arg(short, long, default_value = "demo1")]
        queue: String,

        /// Number of messages (1-32)
        #[arg(short, long, default_value = "32")]
        count: u32,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Load .env file if present
    dotenvy::dotenv().ok();
    let connection_string = connection_string_from_env()?;

    match cli.command {
        Commands::Worker {
            poll_interval,
            queue,
            max_jobs,
            handler,
            once,
        } => {
            info!("Initializing worker...");

            let config = WorkerConfig::builder()
                .poll_interval_secs(poll_interval)
                .queue_name(&queue)
                .max_concurrent_jobs(max_jobs)
                .default_handler(&handler)
                .build();

            let transport = StorageTransport::new(&config.transport)?;
            let queue_client =
                QueueClient::from_connection_string(transport.clone(), &connection_string)?;
            let registry = default_registry(&config.default_handler)?;
            registry
                .get(&config.default_handler)
                .with_context(|| format!("no handler named '{}'", config.default_handler))?;

            let runner = JobRunner::new(Arc::new(BlobClient::new(transport)));
            let worker = QueueWorker::new(Arc::new(queue_client), runner, registry, config);

            if once {
                match worker.run_once().await {
                    Ok(Some(report)) => {
                        println!(
                            "Job {} processed successfully ({} log lines)",
                            report.job_id, report.log_lines
                        );
                    }
                    Ok(None) => {
                        println!("No pending messages found");
                    }
                    Err(e) => {
                        eprintln!("Error processing job: {}", e);
                        return Err(e.into());
                    }
                }
            } else {
                // Setup graceful shutdown
                let shutdown = worker.shutdown_handle();
                setup_signal_handler(shutdown);

                worker.run().await?;
            }
        }

        Commands::Enqueue {
            queue,
            message,
            file,
        } => {
            let text = match (message, file) {
                (Some(text), _) => text,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?,
                (None, None) => anyhow::bail!("either --message or --file is required"),
            };

            let client = queue_client(&connection_string)?;
            let receipt = client.enqueue(&queue, &text).await?;
            println!("Enqueued message {} on {}", receipt.id, queue);
            if let Some(expires) = receipt.expiration_time {
                println!("  Expires: {}", expires);
            }
        }

        Commands::Peek { queue, count, json } => {
            let client = queue_client(&connection_string)?;
            let messages = client.peek(&queue, count.clamp(1, MAX_PEEK_COUNT)).await?;

            if json {
                let values: Vec<serde_json::Value> = messages
                    .iter()
                    .map(|m| {
                        serde_json::json!({
                            "id": m.id,
                            "dequeueCount": m.dequeue_count,
                            "body": m.body,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&values)?);
            } else {
                println!("=== {} ({} visible) ===", queue, messages.len());
                for message in &messages {
                    println!(
                        "  - {} (dequeued {}x): {}",
                        message.id, message.dequeue_count, message.body
                    );
                }
            }
        }
    }

    Ok(())
}

fn queue_client(connection_string: &str) -> Result<QueueClient> {
    let config = WorkerConfig::default();
    let transport = StorageTransport::new(&config.transport)?;
    Ok(QueueClient::from_connection_string(
        transport,
        connection_string,
    )?)
}
