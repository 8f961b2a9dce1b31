//! Metrics and health HTTP endpoints.

use crate::error::TelemetryResult;
use crate::metrics::Metrics;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Create the router serving `/metrics` and `/health`.
///
/// `/health` answers 200 once `ready` is true (the first feed snapshot has
/// been applied) and 503 before that.
pub fn create_router(ready: watch::Receiver<bool>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(ready)
}

async fn metrics_handler() -> impl IntoResponse {
    match Metrics::encode_text() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn health_handler(State(ready): State<watch::Receiver<bool>>) -> impl IntoResponse {
    if *ready.borrow() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "starting")
    }
}

/// Serve until the token is cancelled.
pub async fn run_server(
    addr: SocketAddr,
    ready: watch::Receiver<bool>,
    token: CancellationToken,
) -> TelemetryResult<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Starting HTTP server");

    axum::serve(listener, create_router(ready))
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn serve(ready: watch::Receiver<bool>) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, create_router(ready)).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_health_follows_readiness() {
        let (tx, rx) = watch::channel(false);
        let base = serve(rx).await;

        let resp = reqwest::get(format!("{base}/health")).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);

        tx.send(true).unwrap();
        let resp = reqwest::get(format!("{base}/health")).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        Metrics::set_running_feeds(4);
        let (_tx, rx) = watch::channel(true);
        let base = serve(rx).await;

        let body = reqwest::get(format!("{base}/metrics"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(body.contains("feedmon_running_feeds"));
    }

    #[tokio::test]
    async fn test_run_server_stops_on_cancel() {
        let (_tx, rx) = watch::channel(true);
        let token = CancellationToken::new();
        let handle = tokio::spawn(run_server(
            "127.0.0.1:0".parse().unwrap(),
            rx,
            token.clone(),
        ));
        token.cancel();
        handle.await.unwrap().unwrap();
    }
}
