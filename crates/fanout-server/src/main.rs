#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use fanout_core::{AnalyzerPool, AnalyzerSink, Config, DispatchEngine};
use fanout_server::api;

/// Weighted log fan-out service: accepts log batches and forwards each one to
/// a downstream analyzer chosen in proportion to the live analyzers' weights.
#[derive(Debug, Parser)]
#[command(name = "fanout-server", version)]
struct Cli {
    /// Address the HTTP listener binds to
    #[arg(long, default_value = "0.0.0.0:8080")]
    http_addr: String,

    /// Capacity of the ingress queue and of the retry queue
    #[arg(long, default_value_t = 10_000)]
    queue_size: usize,

    /// Number of dispatch worker tasks
    #[arg(long, default_value_t = 10)]
    workers: usize,

    /// Seconds between analyzer health probe rounds
    #[arg(long, default_value_t = 10)]
    health_check_interval: u64,

    /// Delivery attempts per batch before it is dropped
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// Seconds between paced retry dispatches
    #[arg(long, default_value_t = 5)]
    retry_interval: u64,
}

impl Cli {
    fn engine_config(&self) -> Config {
        Config {
            queue_size: self.queue_size,
            workers: self.workers,
            health_check_interval: Duration::from_secs(self.health_check_interval),
            max_retries: self.max_retries,
            retry_interval: Duration::from_secs(self.retry_interval),
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

/// Resolves once SIGINT or SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("SERVER | Failed to install SIGINT handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("SERVER | Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("SERVER | Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    let config = cli.engine_config();
    config.validate()?;

    let pool = Arc::new(AnalyzerPool::new(config.health_check_interval));
    let engine = Arc::new(DispatchEngine::new(
        Arc::clone(&pool) as Arc<dyn AnalyzerSink>,
        &config,
    ));
    engine.start().await;

    let shutdown = CancellationToken::new();
    let prober = tokio::spawn(Arc::clone(&pool).run_health_probes(shutdown.clone()));

    let app = api::router(api::AppState {
        engine: Arc::clone(&engine),
        pool: Arc::clone(&pool),
    });

    let listener = tokio::net::TcpListener::bind(&cli.http_addr).await?;
    info!(
        "SERVER | Fan-out server listening on {} ({} workers, queue size {})",
        cli.http_addr, config.workers, config.queue_size
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown.cancel();
    engine.stop().await;
    let _ = prober.await;

    info!("SERVER | Shutdown complete");
    Ok(())
}
