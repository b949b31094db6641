//! Analyzer pool behavior against real HTTP analyzers (axum mocks).

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{extract::State, http::StatusCode, routing::get, routing::post, Json, Router};
use chrono::Utc;
use fanout_core::error::ForwardError;
use fanout_core::model::LogBatch;
use fanout_core::pool::{AnalyzerPool, AnalyzerSink};
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
struct MockState {
    healthy: Arc<AtomicBool>,
    analyze_status: Arc<AtomicU32>,
    batches_seen: Arc<AtomicU32>,
}

/// A controllable analyzer: `/analyze` answers with a configurable status,
/// `/health` answers 200 or 503 depending on the `healthy` flag.
struct MockAnalyzer {
    addr: SocketAddr,
    state: MockState,
}

impl MockAnalyzer {
    async fn start() -> Self {
        let state = MockState {
            healthy: Arc::new(AtomicBool::new(true)),
            analyze_status: Arc::new(AtomicU32::new(200)),
            batches_seen: Arc::new(AtomicU32::new(0)),
        };

        let app = Router::new()
            .route("/analyze", post(handle_analyze))
            .route("/health", get(handle_health))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind mock analyzer");
        let addr = listener.local_addr().expect("no local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock analyzer died");
        });

        Self { addr, state }
    }

    fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

async fn handle_analyze(
    State(state): State<MockState>,
    Json(_batch): Json<LogBatch>,
) -> StatusCode {
    state.batches_seen.fetch_add(1, Ordering::SeqCst);
    StatusCode::from_u16(state.analyze_status.load(Ordering::SeqCst) as u16)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

async fn handle_health(State(state): State<MockState>) -> StatusCode {
    if state.healthy.load(Ordering::SeqCst) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

fn sample_batch() -> LogBatch {
    LogBatch {
        packet_id: "packet-1".to_string(),
        agent_id: "test-agent".to_string(),
        sent_at: Utc::now(),
        received_at: Some(Utc::now()),
        log_messages: Vec::new(),
        metadata: None,
    }
}

/// Reserves a port with nothing listening on it.
async fn dead_endpoint() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind");
    let addr = listener.local_addr().expect("no local addr");
    drop(listener);
    format!("http://{addr}")
}

#[tokio::test]
async fn forward_delivers_to_the_analyze_endpoint() {
    let analyzer = MockAnalyzer::start().await;
    let pool = AnalyzerPool::new(Duration::from_secs(60));
    pool.register("a1", &analyzer.url(), 1.0).unwrap();

    let target = pool.snapshot_live().remove(0);
    pool.forward(&target, &sample_batch()).await.unwrap();

    assert_eq!(analyzer.state.batches_seen.load(Ordering::SeqCst), 1);
    // A successful forward leaves the entry live.
    assert_eq!(pool.snapshot_live().len(), 1);
}

#[tokio::test]
async fn forward_treats_non_200_as_failure_without_touching_liveness() {
    let analyzer = MockAnalyzer::start().await;
    analyzer.state.analyze_status.store(500, Ordering::SeqCst);

    let pool = AnalyzerPool::new(Duration::from_secs(60));
    pool.register("a1", &analyzer.url(), 1.0).unwrap();

    let target = pool.snapshot_live().remove(0);
    let err = pool.forward(&target, &sample_batch()).await.unwrap_err();

    assert!(matches!(
        err,
        ForwardError::Status { ref id, status }
            if id == "a1" && status == StatusCode::INTERNAL_SERVER_ERROR
    ));
    // The health prober, not the forward path, owns this case.
    assert_eq!(pool.snapshot_live().len(), 1);
}

#[tokio::test]
async fn forward_transport_error_marks_the_analyzer_not_live() {
    let pool = AnalyzerPool::new(Duration::from_secs(60));
    pool.register("a1", &dead_endpoint().await, 1.0).unwrap();

    let target = pool.snapshot_live().remove(0);
    let err = pool.forward(&target, &sample_batch()).await.unwrap_err();

    assert!(matches!(err, ForwardError::Transport { ref id, .. } if id == "a1"));
    assert!(pool.snapshot_live().is_empty());
    assert_eq!(pool.total_live_weight(), 0.0);
}

/// Polls the live set until it has `expected` entries or the deadline passes.
async fn wait_for_live_count(pool: &AnalyzerPool, expected: usize) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if pool.snapshot_live().len() == expected {
            return;
        }
        assert!(
            Instant::now() < deadline,
            "live set never reached {expected} entries"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn health_probes_demote_and_promote() {
    let analyzer = MockAnalyzer::start().await;
    let pool = Arc::new(AnalyzerPool::new(Duration::from_millis(50)));
    pool.register("a1", &analyzer.url(), 1.0).unwrap();

    let cancel = CancellationToken::new();
    let prober = tokio::spawn(Arc::clone(&pool).run_health_probes(cancel.clone()));

    // Healthy analyzer stays live across probe rounds.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(pool.snapshot_live().len(), 1);

    // Unhealthy response demotes it.
    analyzer.state.healthy.store(false, Ordering::SeqCst);
    wait_for_live_count(&pool, 0).await;

    // Recovery promotes it again.
    analyzer.state.healthy.store(true, Ordering::SeqCst);
    wait_for_live_count(&pool, 1).await;

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), prober)
        .await
        .expect("prober did not stop")
        .expect("prober panicked");
}

#[tokio::test]
async fn health_probes_demote_unreachable_analyzers() {
    let pool = Arc::new(AnalyzerPool::new(Duration::from_millis(50)));
    pool.register("gone", &dead_endpoint().await, 1.0).unwrap();
    assert_eq!(pool.snapshot_live().len(), 1);

    let cancel = CancellationToken::new();
    tokio::spawn(Arc::clone(&pool).run_health_probes(cancel.clone()));

    wait_for_live_count(&pool, 0).await;
    cancel.cancel();
}

#[tokio::test]
async fn probes_recover_an_analyzer_demoted_by_a_failed_forward() {
    let analyzer = MockAnalyzer::start().await;
    let pool = Arc::new(AnalyzerPool::new(Duration::from_millis(50)));
    pool.register("a1", &analyzer.url(), 1.0).unwrap();

    // A forward-driven demotion, as after a transport error.
    pool.set_live("a1", false);
    assert!(pool.snapshot_live().is_empty());

    let cancel = CancellationToken::new();
    tokio::spawn(Arc::clone(&pool).run_health_probes(cancel.clone()));

    // Probes target every registered entry, not only the live ones.
    wait_for_live_count(&pool, 1).await;
    cancel.cancel();
}
