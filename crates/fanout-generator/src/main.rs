//! Traffic generator for the fan-out server.
//!
//! Sends randomized log batches to the ingress endpoint at a configured rate
//! and reports how many were accepted. Intended for manual load and failover
//! experiments against a running `fanout-server`.

use std::time::{Duration, Instant};

use chrono::Utc;
use clap::Parser;
use rand::Rng;
use reqwest::StatusCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use fanout_core::{LogBatch, LogRecord, Severity};

const SENDER_TASKS: usize = 10;

const SOURCES: &[&str] = &[
    "web-server",
    "api-gateway",
    "database",
    "auth-service",
    "payment-service",
    "user-service",
    "notification-service",
];

const MESSAGES: &[&str] = &[
    "User logged in successfully",
    "Failed login attempt",
    "Database connection timeout",
    "Payment processed successfully",
    "Invalid request parameters",
    "Cache miss",
    "Rate limit exceeded",
    "Resource not found",
    "Permission denied",
    "Operation completed successfully",
];

#[derive(Debug, Parser)]
#[command(name = "fanout-generator", version)]
struct Cli {
    /// Base URL of the fan-out server
    #[arg(long, default_value = "http://localhost:8080")]
    url: String,

    /// Agent identifier stamped on every batch
    #[arg(long, default_value = "test-agent")]
    agent: String,

    /// Batches per second across all sender tasks
    #[arg(long, default_value_t = 10)]
    rate: usize,

    /// Log records per batch
    #[arg(long, default_value_t = 5)]
    batch: usize,

    /// Test duration in seconds
    #[arg(long, default_value_t = 30)]
    duration: u64,
}

fn random_severity() -> Severity {
    let roll: f64 = rand::thread_rng().gen();
    match roll {
        r if r < 0.6 => Severity::Info,
        r if r < 0.8 => Severity::Warning,
        r if r < 0.95 => Severity::Error,
        _ => Severity::Fatal,
    }
}

fn random_batch(agent_id: &str, batch_size: usize) -> LogBatch {
    let mut rng = rand::thread_rng();

    let log_messages = (0..batch_size)
        .map(|_| {
            let age = rng.gen_range(0..60);
            LogRecord {
                id: Uuid::new_v4().to_string(),
                timestamp: Utc::now() - chrono::Duration::seconds(age),
                level: random_severity(),
                source: SOURCES[rng.gen_range(0..SOURCES.len())].to_string(),
                message: MESSAGES[rng.gen_range(0..MESSAGES.len())].to_string(),
                metadata: Some(
                    [
                        (
                            "request_id".to_string(),
                            serde_json::json!(Uuid::new_v4().to_string()),
                        ),
                        (
                            "user_id".to_string(),
                            serde_json::json!(format!("user-{}", rng.gen_range(0..1_000))),
                        ),
                    ]
                    .into_iter()
                    .collect(),
                ),
            }
        })
        .collect();

    LogBatch {
        packet_id: Uuid::new_v4().to_string(),
        agent_id: agent_id.to_string(),
        sent_at: Utc::now(),
        received_at: None,
        log_messages,
        metadata: None,
    }
}

async fn sender_task(
    client: reqwest::Client,
    url: String,
    agent: String,
    batch_size: usize,
    count: usize,
) -> (u64, u64) {
    let mut accepted = 0;
    let mut rejected = 0;

    for _ in 0..count {
        // Light jitter so senders do not fire in lockstep.
        let jitter = {
            let mut rng = rand::thread_rng();
            if rng.gen::<f64>() < 0.1 {
                Some(Duration::from_millis(rng.gen_range(0..20)))
            } else {
                None
            }
        };
        if let Some(pause) = jitter {
            tokio::time::sleep(pause).await;
        }

        let batch = random_batch(&agent, batch_size);
        match client
            .post(format!("{url}/api/v1/logs"))
            .json(&batch)
            .send()
            .await
        {
            Ok(response) if response.status() == StatusCode::ACCEPTED => accepted += 1,
            Ok(response) => {
                warn!("GENERATOR | Batch rejected with status {}", response.status());
                rejected += 1;
            }
            Err(e) => {
                warn!("GENERATOR | Failed to send batch: {e}");
                rejected += 1;
            }
        }
    }

    (accepted, rejected)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let total_batches = cli.rate * cli.duration as usize;
    let per_task = total_batches / SENDER_TASKS;

    info!(
        "GENERATOR | Sending {total_batches} batches ({} batches/sec, {} records/batch) to {}",
        cli.rate, cli.batch, cli.url
    );

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;

    let started = Instant::now();
    let mut senders = Vec::with_capacity(SENDER_TASKS);
    for _ in 0..SENDER_TASKS {
        senders.push(tokio::spawn(sender_task(
            client.clone(),
            cli.url.clone(),
            cli.agent.clone(),
            cli.batch,
            per_task,
        )));
    }

    let mut accepted = 0;
    let mut rejected = 0;
    for sender in senders {
        let (ok, failed) = sender.await?;
        accepted += ok;
        rejected += failed;
    }

    let elapsed = started.elapsed();
    let sent = accepted + rejected;
    info!("GENERATOR | Completed in {elapsed:.2?}");
    info!("GENERATOR | Batches sent: {sent} (accepted: {accepted}, rejected: {rejected})");
    info!(
        "GENERATOR | Average rate: {:.2} batches/sec, {} records total",
        sent as f64 / elapsed.as_secs_f64(),
        sent as usize * cli.batch
    );

    Ok(())
}
