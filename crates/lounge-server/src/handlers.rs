//! Route handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use lounge_common::new_correlation_id;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::token::{self, Claims};
use crate::AppState;

/// Errors surfaced to clients. Details stay in the log.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Failed to create room")]
    CreateRoom,

    #[error("Token generation failed")]
    TokenGeneration,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateRoomBody {
    pub title: Option<String>,
}

const DEFAULT_ROOM_TITLE: &str = "Live Room";

pub async fn healthz() -> &'static str {
    "ok"
}

/// Forward a room creation to the provider and hand back its response.
pub async fn create_room(
    State(state): State<AppState>,
    body: Option<Json<CreateRoomBody>>,
) -> Result<Json<Value>, ApiError> {
    let title = body
        .and_then(|Json(b)| b.title)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_ROOM_TITLE.to_string());
    let request_id = new_correlation_id();

    let url = format!(
        "{}/create-room",
        state.config.provider_url.trim_end_matches('/')
    );
    let response = state
        .http
        .post(&url)
        .header("x-api-key", &state.config.provider_api_key)
        .json(&json!({ "title": title, "roomType": state.config.room_type }))
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| {
            warn!(request_id = %request_id, url = %url, error = %e, "Provider room creation failed");
            ApiError::CreateRoom
        })?;

    let data: Value = response.json().await.map_err(|e| {
        warn!(request_id = %request_id, error = %e, "Provider returned an unreadable body");
        ApiError::CreateRoom
    })?;
    info!(request_id = %request_id, title = %title, "Room created with provider");
    Ok(Json(data))
}

#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TokenBody {
    pub user_id: String,
    pub role: String,
    pub room_id: String,
}

impl Default for TokenBody {
    fn default() -> Self {
        Self {
            user_id: "guest-user".into(),
            role: "host".into(),
            room_id: String::new(),
        }
    }
}

pub async fn generate_token(
    State(state): State<AppState>,
    body: Option<Json<TokenBody>>,
) -> Result<Json<Value>, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let request_id = new_correlation_id();
    let claims = Claims::new(
        body.user_id,
        body.role,
        body.room_id,
        chrono::Utc::now().timestamp(),
        state.token_ttl_secs,
    );

    let token = token::sign(&claims, &state.config.token_secret).map_err(|e| {
        warn!(request_id = %request_id, error = %e, "Token signing failed");
        ApiError::TokenGeneration
    })?;
    info!(
        request_id = %request_id,
        user_id = %claims.user_id,
        room_id = %claims.room_id,
        role = %claims.role,
        "Token issued"
    );
    Ok(Json(json!({ "token": token })))
}
