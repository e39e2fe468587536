//! HTTP route handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use obra_registry::RecordFilter;
use serde::Deserialize;
use serde_json::{json, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use super::error::ApiError;
use super::json_error;
use super::state::AppState;
use crate::wire::{record_json, records_json, registration_json, stats_json};

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> impl IntoResponse {
    json_error(StatusCode::NOT_FOUND, "not found", "no such route")
}

/// GET /
pub(crate) async fn handle_info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "name": "Obra Registry API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "GET /health",
            "stats": "GET /api/stats",
            "obras": {
                "all": "GET /api/obras",
                "byId": "GET /api/obras/{id}",
                "byUbicacion": "GET /api/obras/ubicacion/{ciudad}",
                "create": "POST /api/obras",
            },
        },
        "blockchain": {
            "connected": state.registry.is_some(),
            "contractAddress": state.contract_address().unwrap_or("not deployed"),
            "rpcUrl": state.rpc_url,
        },
    }))
}

/// GET /health
pub(crate) async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let timestamp = OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default();
    Json(json!({
        "status": "ok",
        "blockchain": if state.registry.is_some() { "connected" } else { "disconnected" },
        "timestamp": timestamp,
    }))
}

/// GET /api/stats
pub(crate) async fn handle_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let (stats, block) = state
        .call(|registry| async move {
            let stats = registry.summarize().await?;
            let block = registry.current_block().await?;
            Ok((stats, block))
        })
        .await?;
    Ok(Json(stats_json(&stats, block, state.contract_address())))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListParams {
    activas: Option<String>,
}

/// GET /api/obras?activas=true
pub(crate) async fn handle_list(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, ApiError> {
    let filter = if params.activas.as_deref() == Some("true") {
        RecordFilter::ActiveOnly
    } else {
        RecordFilter::Any
    };
    let records = state
        .call(|registry| async move { registry.list_all(&filter).await })
        .await?;
    Ok(Json(records_json(&records)))
}

/// GET /api/obras/{id}
pub(crate) async fn handle_get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id: i64 = id
        .trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid obra id '{}'", id)))?;
    let record = state
        .call(|registry| async move { registry.get_by_id(id).await })
        .await?;
    Ok(Json(record_json(&record)))
}

/// GET /api/obras/ubicacion/{ciudad}
pub(crate) async fn handle_by_location(
    State(state): State<Arc<AppState>>,
    Path(ciudad): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let term = ciudad.clone();
    let records = state
        .call(|registry| async move { registry.search(&term).await })
        .await?;
    let mut body = records_json(&records);
    body["ciudad"] = json!(ciudad);
    Ok(Json(body))
}

/// Fields a new obra needs in the POST body.
const REQUIRED_FIELDS: [&str; 3] = ["datosJSON", "ubicacion", "tipoObra"];

/// POST /api/obras
pub(crate) async fn handle_create(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = body.get("datosJSON").filter(|v| !v.is_null()).cloned();
    let text = |field: &str| {
        body.get(field)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
    };
    let (Some(payload), Some(location), Some(kind)) =
        (payload, text("ubicacion"), text("tipoObra"))
    else {
        return Err(ApiError::BadRequest(format!(
            "missing required fields: {}",
            REQUIRED_FIELDS.join(", ")
        )));
    };
    let verify = body
        .get("verificar")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let receipt = state
        .call(|registry| async move {
            if verify {
                registry
                    .register_and_verify(&location, &kind, &payload)
                    .await
                    .map(|(receipt, _)| receipt)
            } else {
                registry.register(&location, &kind, &payload).await
            }
        })
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(registration_json(&receipt, verify)),
    ))
}
