//! Standalone analyzer stub.
//!
//! Accepts batches on `/analyze`, counts the records it sees, and answers
//! health probes on `/health`. Useful as a downstream target for manual runs
//! and load tests of the fan-out server.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use serde_json::json;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use fanout_core::LogBatch;

#[derive(Debug, Parser)]
#[command(name = "fanout-analyzer", version)]
struct Cli {
    /// Analyzer identifier reported on the health endpoint
    #[arg(long, default_value = "analyzer1")]
    id: String,

    /// Port the HTTP listener binds to
    #[arg(long, default_value_t = 8081)]
    port: u16,

    /// Weight to register this analyzer with (informational)
    #[arg(long, default_value_t = 1.0)]
    weight: f64,
}

#[derive(Clone)]
struct AnalyzerState {
    id: Arc<String>,
    records_seen: Arc<AtomicU64>,
}

async fn handle_analyze(
    State(state): State<AnalyzerState>,
    Json(batch): Json<LogBatch>,
) -> (StatusCode, Json<serde_json::Value>) {
    let total = state
        .records_seen
        .fetch_add(batch.log_messages.len() as u64, Ordering::SeqCst)
        + batch.log_messages.len() as u64;

    info!(
        "ANALYZER {} | Received batch {} with {} records (total: {total})",
        state.id,
        batch.packet_id,
        batch.log_messages.len()
    );

    (StatusCode::OK, Json(json!({ "status": "processed" })))
}

async fn handle_health(State(state): State<AnalyzerState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "id": *state.id,
        "records_seen": state.records_seen.load(Ordering::SeqCst),
    }))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let state = AnalyzerState {
        id: Arc::new(cli.id.clone()),
        records_seen: Arc::new(AtomicU64::new(0)),
    };

    let app = Router::new()
        .route("/analyze", post(handle_analyze))
        .route("/health", get(handle_health))
        .with_state(state);

    let addr = format!("0.0.0.0:{}", cli.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(
        "ANALYZER {} | Listening on {addr} with weight {:.2}",
        cli.id, cli.weight
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("ANALYZER | Failed to install SIGINT handler: {e}");
                std::future::pending::<()>().await;
            }
            info!("ANALYZER | Shutting down");
        })
        .await?;

    Ok(())
}
