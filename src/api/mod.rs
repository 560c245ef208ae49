// HTTP API routes (maps, territory sets, metrics) and the event socket.

pub mod ws;

use axum::{
    body::Body,
    extract::{Json, Path, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

use crate::db::Database;
use crate::editor::TerritorySet;
use crate::hub::MapHub;
use crate::metrics;
use crate::protocol::ServerEvent;

// ── Request types ─────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMapRequest {
    pub name: String,
    pub image_url: Option<String>,
}

/// Absent fields are left alone; an empty `imageUrl` clears the image.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMapRequest {
    pub name: Option<String>,
    pub image_url: Option<String>,
}

// ── Shared application state ─────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub hub: Arc<MapHub>,
}

// ── Error helper ──────────────────────────────────────────────────────

fn json_error(status: StatusCode, msg: &str) -> impl IntoResponse {
    (status, Json(json!({ "error": msg })))
}

fn internal_error(e: sqlx::Error) -> impl IntoResponse {
    tracing::error!("Database error: {e}");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

// ── Router ────────────────────────────────────────────────────────────

pub fn router(db: Arc<Database>, hub: Arc<MapHub>) -> Router {
    let state = AppState { db, hub };

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(get_metrics))
        // Maps
        .route("/api/maps", get(list_maps).post(create_map))
        .route(
            "/api/maps/{map_id}",
            get(get_map).put(update_map).delete(delete_map),
        )
        // Territory sets
        .route(
            "/api/maps/{map_id}/territories",
            get(get_territories).put(put_territories),
        )
        // WebSocket
        .route("/ws/maps", get(ws::ws_maps))
        .layer(middleware::from_fn(track_requests))
        .with_state(state)
}

/// Request counter and latency histogram, labelled by normalized path.
async fn track_requests(req: Request<Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let endpoint = metrics::normalize_path(req.uri().path());
    let start = Instant::now();

    let response = next.run(req).await;

    metrics::API_REQUEST_DURATION_SECONDS
        .with_label_values(&[&endpoint])
        .observe(start.elapsed().as_secs_f64());
    metrics::API_REQUESTS_TOTAL
        .with_label_values(&[&method, &endpoint, response.status().as_str()])
        .inc();
    response
}

async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "territory-backend",
        "time": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn get_metrics() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        metrics::gather_metrics(),
    )
}

// ── Map handlers ──────────────────────────────────────────────────────

async fn list_maps(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.list_maps().await {
        Ok(maps) => (StatusCode::OK, Json(json!(maps))).into_response(),
        Err(e) => internal_error(e).into_response(),
    }
}

async fn create_map(
    State(state): State<AppState>,
    Json(req): Json<CreateMapRequest>,
) -> impl IntoResponse {
    let name = req.name.trim();
    if name.is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "name is required").into_response();
    }
    let image_url = req.image_url.as_deref().filter(|u| !u.is_empty());
    match state.db.create_map(name, image_url).await {
        Ok(map) => {
            tracing::info!(map_id = %map.id, name = %map.name, "Created map");
            (StatusCode::CREATED, Json(json!(map))).into_response()
        }
        Err(e) => internal_error(e).into_response(),
    }
}

async fn get_map(State(state): State<AppState>, Path(map_id): Path<String>) -> impl IntoResponse {
    match state.db.get_map(&map_id).await {
        Ok(Some(map)) => (StatusCode::OK, Json(json!(map))).into_response(),
        Ok(None) => json_error(StatusCode::NOT_FOUND, "Map not found").into_response(),
        Err(e) => internal_error(e).into_response(),
    }
}

async fn update_map(
    State(state): State<AppState>,
    Path(map_id): Path<String>,
    Json(req): Json<UpdateMapRequest>,
) -> impl IntoResponse {
    let existing = match state.db.get_map(&map_id).await {
        Ok(Some(map)) => map,
        Ok(None) => return json_error(StatusCode::NOT_FOUND, "Map not found").into_response(),
        Err(e) => return internal_error(e).into_response(),
    };

    let name = match req.name.as_deref().map(str::trim) {
        Some("") => {
            return json_error(StatusCode::BAD_REQUEST, "name must not be empty").into_response()
        }
        Some(name) => name.to_string(),
        None => existing.name,
    };
    let image_url = match req.image_url {
        Some(url) if url.is_empty() => None,
        Some(url) => Some(url),
        None => existing.image_url,
    };

    match state
        .db
        .update_map(&map_id, &name, image_url.as_deref())
        .await
    {
        Ok(Some(map)) => {
            let event = ServerEvent::MapUpdate {
                map_id: map.id.clone(),
                name: map.name.clone(),
                image_url: map.image_url.clone(),
            };
            if let Err(e) = state.hub.publish(&event) {
                tracing::error!("Failed to publish map update: {e}");
            }
            (StatusCode::OK, Json(json!(map))).into_response()
        }
        Ok(None) => json_error(StatusCode::NOT_FOUND, "Map not found").into_response(),
        Err(e) => internal_error(e).into_response(),
    }
}

async fn delete_map(
    State(state): State<AppState>,
    Path(map_id): Path<String>,
) -> impl IntoResponse {
    match state.db.delete_map(&map_id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => json_error(StatusCode::NOT_FOUND, "Map not found").into_response(),
        Err(e) => internal_error(e).into_response(),
    }
}

// ── Territory handlers ────────────────────────────────────────────────

async fn get_territories(
    State(state): State<AppState>,
    Path(map_id): Path<String>,
) -> impl IntoResponse {
    match state.db.get_map(&map_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return json_error(StatusCode::NOT_FOUND, "Map not found").into_response(),
        Err(e) => return internal_error(e).into_response(),
    }
    match state.db.load_territories(&map_id).await {
        Ok(set) => (StatusCode::OK, Json(json!(set))).into_response(),
        Err(e) => internal_error(e).into_response(),
    }
}

/// Replace a map's territories, then notify everyone joined to the map.
async fn put_territories(
    State(state): State<AppState>,
    Path(map_id): Path<String>,
    Json(set): Json<TerritorySet>,
) -> impl IntoResponse {
    match state.db.get_map(&map_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return json_error(StatusCode::NOT_FOUND, "Map not found").into_response(),
        Err(e) => return internal_error(e).into_response(),
    }

    let set = match set.normalized() {
        Ok(set) => set,
        Err((index, e)) => {
            metrics::VALIDATION_FAILURES_TOTAL.inc();
            return json_error(
                StatusCode::BAD_REQUEST,
                &format!("territory {index}: {e}"),
            )
            .into_response();
        }
    };

    if let Err(e) = state.db.save_territories(&map_id, &set).await {
        return internal_error(e).into_response();
    }
    metrics::TERRITORY_SETS_SAVED_TOTAL.inc();
    tracing::info!(
        map_id = %map_id,
        count = set.territories.len(),
        "Saved territory set"
    );

    let event = ServerEvent::TerritoryUpdate {
        map_id: map_id.clone(),
        territories: set.territories.clone(),
    };
    if let Err(e) = state.hub.publish(&event) {
        tracing::error!("Failed to publish territory update: {e}");
    }

    (StatusCode::OK, Json(json!(set))).into_response()
}
