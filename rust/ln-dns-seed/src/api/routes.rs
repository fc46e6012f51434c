//! API Routes
//!
//! HTTP endpoints for metrics and health checks

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::Metrics;
use crate::registry::PeerRegistry;

/// Shared API state
pub struct ApiState {
    pub root_domain: String,
    pub registry: Arc<PeerRegistry>,
    pub metrics: Arc<Metrics>,
}

/// Build the API router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        // Health & Status
        .route("/health", get(health_check))
        .route("/status", get(get_status))

        // Metrics
        .route("/metrics", get(get_metrics_prometheus))
        .route("/metrics/json", get(get_metrics_json))

        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Serve the HTTP API on an already bound listener
pub async fn run_api_server(listener: TcpListener, state: Arc<ApiState>) -> anyhow::Result<()> {
    info!("📊 HTTP API server listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state)).await?;

    Ok(())
}

/// GET /health - Simple health check
async fn health_check() -> impl IntoResponse {
    "OK"
}

/// GET /status - Detailed status
async fn get_status(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let stats = state.registry.stats();

    let status = serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.metrics.uptime_secs(),
        "root_domain": state.root_domain,
        "registry": stats,
    });

    Json(status)
}

/// GET /metrics - Prometheus format metrics
async fn get_metrics_prometheus(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let stats = state.registry.stats();

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        state.metrics.to_prometheus(&stats),
    )
}

/// GET /metrics/json - JSON format metrics
async fn get_metrics_json(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let stats = state.registry.stats();
    Json(state.metrics.to_json(&stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tests::{addr, test_node_id};
    use crate::types::DEFAULT_PORT;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn state() -> Arc<ApiState> {
        let registry = Arc::new(PeerRegistry::new(DEFAULT_PORT));
        registry.upsert(test_node_id(1), vec![addr("10.0.0.1:9735")]);
        registry.upsert(test_node_id(2), vec![addr("[2001:db8::2]:9736")]);

        Arc::new(ApiState {
            root_domain: "seed.example".to_string(),
            registry,
            metrics: Arc::new(Metrics::new()),
        })
    }

    async fn get(uri: &str) -> (StatusCode, String) {
        let response = router(state())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");
    }

    #[tokio::test]
    async fn test_status_format() {
        let (status, body) = get("/status").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["root_domain"], "seed.example");
        assert_eq!(json["registry"]["total_peers"], 2);
        assert_eq!(json["registry"]["default_port_peers"], 1);
    }

    #[tokio::test]
    async fn test_metrics_endpoints() {
        let (status, body) = get("/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("ln_dns_seed_peers 2"));
        assert!(body.contains("ln_dns_seed_peers_ipv4 1"));

        let (_, body) = get("/metrics/json").await;
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["registry"]["ipv6_peers"], 1);
        assert_eq!(json["dns"]["answered"], 0);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (status, _) = get("/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
