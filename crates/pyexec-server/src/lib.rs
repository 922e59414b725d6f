//! HTTP surface of the pyexec service.
//!
//! A thin axum layer over the job manager: two submission shapes, polling,
//! cancellation and a health probe. The server owns nothing but routing and
//! request shaping - all job state lives in the core crate - so the whole
//! router can be exercised in tests against scripted doubles.

pub mod error;
pub mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use pyexec_core::{Config, JobManager, JobStore};
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// How often the store cleaner runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub manager: JobManager,
    pub config: Arc<Config>,
}

/// Assemble the full router with middleware.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/exec/sync", post(handlers::exec_sync))
        .route("/exec/async", post(handlers::exec_async))
        .route("/eval", post(handlers::eval))
        .route("/executions/{id}", get(handlers::get_execution))
        .route("/executions/{id}", delete(handlers::kill_execution));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/v1", api)
        .layer(DefaultBodyLimit::max(handlers::MAX_MULTIPART_BYTES))
        .layer(axum::middleware::from_fn(log_requests))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn log_requests(
    request: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();
    let response = next.run(request).await;
    log::info!(
        "{} {} -> {} in {:?}",
        method,
        uri,
        response.status().as_u16(),
        start.elapsed()
    );
    response
}

/// Periodically reclaim terminal records older than the configured TTL.
/// Runs until the process exits.
pub fn spawn_cleanup(store: Arc<dyn JobStore>, ttl: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CLEANUP_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so startup stays quiet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            log::debug!("running execution cleanup");
            if let Err(e) = store.cleanup(ttl).await {
                log::error!("cleanup failed: {e}");
            }
        }
    });
}

/// Serve until SIGINT or SIGTERM, then drain in-flight requests.
pub async fn serve(router: Router, addr: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("listening on {addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {e}");
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
                log::error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::info!("received Ctrl+C, shutting down"),
        _ = terminate => log::info!("received SIGTERM, shutting down"),
    }
}
