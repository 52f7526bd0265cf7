use crate::app::gateway::IngestionGateway;
use crate::error::StatusError;
use crate::metrics::GatewayMetrics;
use crate::types::{BuildId, BuildRequestCandidate, CollectResponse, MessageBody};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub const WRONG_ROUTE_MESSAGE: &str = "OOPS! Wrong Route";
pub const MISSING_BUILD_ID_MESSAGE: &str = "Build Id is required to fetch details";

#[derive(Clone)]
pub struct AppState {
    pub gateway: IngestionGateway,
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "collect_gateway",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Prometheus scrape endpoint
async fn metrics_text() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        crate::metrics::render(),
    )
}

/// `POST /collect`: validate, assign an id and queue the build.
///
/// The body is parsed by hand so that a missing field is reported by the
/// validator (400) rather than as an extractor rejection.
async fn collect(State(state): State<AppState>, body: Bytes) -> Response {
    let candidate: BuildRequestCandidate = match serde_json::from_slice(&body) {
        Ok(candidate) => candidate,
        Err(e) => {
            GatewayMetrics::record_request_rejected();
            warn!("Undecodable build request body: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(CollectResponse::failed(format!("invalid request body: {e}"))),
            )
                .into_response();
        }
    };

    match state.gateway.submit(candidate).await {
        Ok(outcome) => (StatusCode::OK, Json(CollectResponse::from(outcome))).into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, Json(CollectResponse::failed(e.to_string()))).into_response(),
    }
}

/// `GET /build/{build_id}`: pass the stored status record through verbatim.
async fn build_status(State(state): State<AppState>, Path(raw_id): Path<String>) -> Response {
    let Some(build_id) = BuildId::parse(&raw_id) else {
        return missing_build_id().await.into_response();
    };

    match state.gateway.build_status(&build_id).await {
        Ok(payload) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            payload,
        )
            .into_response(),
        Err(e @ StatusError::NotFound(_)) => {
            (StatusCode::NOT_FOUND, Json(MessageBody::new(e.to_string()))).into_response()
        }
        Err(e @ StatusError::Store(_)) => {
            (StatusCode::INTERNAL_SERVER_ERROR, Json(MessageBody::new(e.to_string()))).into_response()
        }
    }
}

async fn missing_build_id() -> impl IntoResponse {
    (
        StatusCode::BAD_REQUEST,
        Json(MessageBody::new(MISSING_BUILD_ID_MESSAGE)),
    )
}

/// Catch-all for unknown paths and unsupported methods on known paths.
async fn route_not_found(method: Method, uri: Uri) -> impl IntoResponse {
    GatewayMetrics::record_route_miss();
    warn!(%method, path = %uri.path(), "Route Not Found");
    (StatusCode::NOT_FOUND, Json(MessageBody::new(WRONG_ROUTE_MESSAGE)))
}

/// Build the router: the gateway API under `base_path`, operational endpoints
/// at the root, and the wrong-route fallback everywhere else.
pub fn create_server(gateway: IngestionGateway, base_path: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    let api = Router::new()
        .route("/collect", post(collect).fallback(route_not_found))
        .route("/build", get(missing_build_id).fallback(route_not_found))
        .route("/build/", get(missing_build_id).fallback(route_not_found))
        .route("/build/:build_id", get(build_status).fallback(route_not_found))
        .with_state(AppState { gateway });

    let base = base_path.trim_end_matches('/');
    let router = if base.is_empty() {
        Router::new().merge(api)
    } else {
        Router::new().nest(base, api)
    };

    router
        .route("/health", get(health))
        .route("/metrics", get(metrics_text))
        .fallback(route_not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}

/// Serve until `shutdown` resolves, then drain in-flight requests.
pub async fn start_server<F>(
    gateway: IngestionGateway,
    port: u16,
    base_path: &str,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_server(gateway, base_path);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server started at port {}", port);
    info!("Collect endpoint: POST http://localhost:{}{}/collect", port, base_path.trim_end_matches('/'));
    info!("Health check:     GET  http://localhost:{}/health", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("HTTP server stopped");
    Ok(())
}
