//! `obra serve` -- HTTP JSON API over the obra registry.
//!
//! Endpoints:
//! - GET  /                               - API description and ledger connection
//! - GET  /health                         - Server status
//! - GET  /api/stats                      - Total, active, inactive, unreadable counts
//! - GET  /api/obras?activas=true         - All obras, optionally active only
//! - GET  /api/obras/{id}                 - One obra
//! - GET  /api/obras/ubicacion/{ciudad}   - Obras whose location contains `ciudad`
//! - POST /api/obras                      - Register an obra
//!
//! When the ledger is not connected the server still starts; ledger routes
//! answer 503. All responses use Content-Type: application/json.

mod error;
mod handlers;
mod middleware;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{middleware as axum_middleware, Json, Router};
use obra_registry::Registry;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use self::handlers::{
    handle_by_location, handle_create, handle_get, handle_health, handle_info, handle_list,
    handle_not_found, handle_stats,
};
use self::middleware::log_requests;
use self::state::AppState;
use crate::config::Config;

/// Maximum request body size: 10 MB.
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Construct a JSON error response with the given status code.
fn json_error(status: StatusCode, error: &str, message: &str) -> impl IntoResponse {
    (
        status,
        Json(serde_json::json!({"error": error, "message": message})),
    )
}

fn cors_layer(origin: &str) -> Result<CorsLayer, String> {
    let allow_origin = if origin.trim() == "*" {
        AllowOrigin::any()
    } else {
        let value = HeaderValue::from_str(origin.trim())
            .map_err(|e| format!("invalid cors origin '{}': {}", origin, e))?;
        AllowOrigin::exact(value)
    };
    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any))
}

pub(crate) fn router(state: Arc<AppState>, cors: CorsLayer) -> Router {
    Router::new()
        .route("/", get(handle_info))
        .route("/health", get(handle_health))
        .route("/api/stats", get(handle_stats))
        .route("/api/obras", get(handle_list).post(handle_create))
        .route("/api/obras/{id}", get(handle_get))
        .route("/api/obras/ubicacion/{ciudad}", get(handle_by_location))
        .fallback(handle_not_found)
        .layer(axum_middleware::from_fn(log_requests))
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}

/// Start the HTTP server on `config.server.port`.
///
/// When TLS cert/key paths are provided, the server listens over HTTPS
/// using `axum-server` with rustls. Otherwise it uses plain HTTP.
pub async fn start_server(
    config: &Config,
    registry: Option<Registry>,
    _tls_cert: Option<PathBuf>,
    _tls_key: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let port = config.server.port;
    let cors = cors_layer(&config.server.cors_origin)?;
    let state = Arc::new(AppState {
        registry,
        rpc_url: config.ledger.rpc_url.clone(),
        request_timeout: config.request_timeout(),
    });
    if state.registry.is_none() {
        tracing::warn!("ledger not connected; ledger routes will answer 503");
    }
    let app = router(state, cors);

    let addr = format!("0.0.0.0:{}", port);

    #[cfg(feature = "tls")]
    if let (Some(cert_path), Some(key_path)) = (&_tls_cert, &_tls_key) {
        let tls =
            axum_server::tls_rustls::RustlsConfig::from_pem_file(cert_path, key_path).await?;
        let socket_addr: std::net::SocketAddr = addr.parse()?;
        tracing::info!(port, "obra registry listening on https");
        axum_server::bind_rustls(socket_addr, tls)
            .serve(app.into_make_service())
            .await?;
        return Ok(());
    }

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(port, "obra registry listening on http");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shut down");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("received shutdown signal");
}
