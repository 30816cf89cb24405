use crate::admission::{handle_socket, JoinRequest};
use crate::app_state::AppState;
use crate::auth::request_token;
use axum::{
    extract::{ws::rejection::WebSocketUpgradeRejection, Query, State, WebSocketUpgrade},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub const SERVICE_NAME: &str = "webrtc-signaling-server";

#[derive(Debug, Deserialize)]
pub struct WsParams {
    user_id: Option<String>,
    room_id: Option<String>,
    token: Option<String>,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index() -> impl IntoResponse {
    Json(json!({
        "message": "Signaling server for four-person video calls",
        "usage": "connect a WebSocket to /ws?user_id=xxx&room_id=yyy&token=zzz; omit room_id to create a room",
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": SERVICE_NAME,
        "rooms": state.registry.len().await,
    }))
}

// WebSocket handler. Identity and gate are checked before the upgrade.
async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let request = match JoinRequest::new(params.user_id, params.room_id) {
        Ok(request) => request,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };

    if !state
        .gate
        .allows(request_token(params.token.as_deref(), &headers))
    {
        warn!(participant = %request.participant_id, "authentication failed");
        return error_response(StatusCode::UNAUTHORIZED, "authentication failed, invalid token");
    }

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    info!(participant = %request.participant_id, room = ?request.room_id, "upgrading connection");
    let limit = state.config.max_message_size;
    ws.max_message_size(limit)
        .max_frame_size(limit)
        .on_upgrade(move |socket| handle_socket(socket, request, state))
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
