//! Backend capabilities: room creation and join-token issuance.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lounge_config::{BackendConfig, TokenConfig, TokenSource};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, RoomError};
use crate::protocol::Role;

/// Creates rooms on the conferencing provider.
#[async_trait]
pub trait RoomBackend: Send + Sync {
    /// Returns the new room's id.
    async fn create_room(&self, title: &str) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    pub user_id: String,
    pub role: Role,
    pub room_id: String,
}

/// Issues the token presented when joining a room.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn issue(&self, request: &TokenRequest) -> Result<String>;
}

// ---------------------------------------------------------------------------
// HTTP backend
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRoomData {
    room_id: String,
}

#[derive(Deserialize)]
struct CreateRoomResponse {
    data: CreateRoomData,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

/// Client for the backend HTTP API.
pub struct HttpRoomBackend {
    base_url: String,
    http: reqwest::Client,
}

impl HttpRoomBackend {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = format!("{}{path}", self.base_url);
        debug!(url = %url, "Backend request");
        let response = self.http.post(&url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(url = %url, status = status.as_u16(), "Backend request failed");
            return Err(RoomError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| RoomError::Parse(format!("{path}: {e}")))
    }
}

#[async_trait]
impl RoomBackend for HttpRoomBackend {
    async fn create_room(&self, title: &str) -> Result<String> {
        let response: CreateRoomResponse = self
            .post("/create-room", &serde_json::json!({ "title": title }))
            .await?;
        Ok(response.data.room_id)
    }
}

#[async_trait]
impl TokenProvider for HttpRoomBackend {
    async fn issue(&self, request: &TokenRequest) -> Result<String> {
        let response: TokenResponse = self.post("/generateHuddleToken", request).await?;
        Ok(response.token)
    }
}

// ---------------------------------------------------------------------------
// Static token
// ---------------------------------------------------------------------------

/// Hands out one fixed token for every join. The placeholder is not a real
/// credential, so every use is logged.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn from_config(config: &TokenConfig) -> Self {
        Self::new(config.static_token.clone())
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn issue(&self, request: &TokenRequest) -> Result<String> {
        warn!(
            room_id = %request.room_id,
            user_id = %request.user_id,
            "Joining with the static placeholder token; set token.source = \"backend\" to use signed tokens"
        );
        Ok(self.token.clone())
    }
}

/// The token provider selected by `token.source`.
pub fn token_provider(
    config: &TokenConfig,
    backend: Arc<HttpRoomBackend>,
) -> Arc<dyn TokenProvider> {
    match config.source {
        TokenSource::Static => Arc::new(StaticTokenProvider::from_config(config)),
        TokenSource::Backend => backend,
    }
}
