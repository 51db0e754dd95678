//! HTTP API for health checks and Prometheus metrics

use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use loadgen_lib::observability::gather_text;
use std::net::SocketAddr;
use tracing::{info, warn};

/// Liveness check, 200 while the process is serving
async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    match gather_text() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; charset=utf-8")],
            body,
        ),
        Err(e) => {
            warn!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain; charset=utf-8")],
                e.to_string(),
            )
        }
    }
}

/// Create the API router
pub fn create_router() -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
}

/// Start the API server
pub async fn serve(addr: SocketAddr) -> anyhow::Result<()> {
    let app = create_router();

    info!(addr = %addr, "Starting metrics server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use loadgen_lib::LoadgenMetrics;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_healthz() {
        let response = create_router()
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        LoadgenMetrics::new().inc_pod_create_retries();

        let response = create_router()
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("cri_loadgen_pod_create_retries_total"));
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let response = create_router()
            .oneshot(Request::get("/readyz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
