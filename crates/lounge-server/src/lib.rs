//! Lounge backend: room creation through the conferencing provider and
//! signed join tokens.

pub mod handlers;
pub mod token;


use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use lounge_config::ServerConfig;

/// Environment variables that override secrets from the config file.
pub const PROVIDER_API_KEY_ENV: &str = "LOUNGE_PROVIDER_API_KEY";
pub const TOKEN_SECRET_ENV: &str = "LOUNGE_TOKEN_SECRET";

const PROVIDER_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone)]
pub struct AppState {
    pub http: reqwest::Client,
    pub config: Arc<ServerConfig>,
    pub token_ttl_secs: u64,
}

impl AppState {
    pub fn new(config: ServerConfig, token_ttl_secs: u64) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(PROVIDER_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            config: Arc::new(config),
            token_ttl_secs,
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/create-room", post(handlers::create_room))
        .route("/generateHuddleToken", post(handlers::generate_token))
        .with_state(state)
}

/// Replace secrets with non-empty values from `lookup`.
pub fn apply_env_overrides(config: &mut ServerConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(key) = lookup(PROVIDER_API_KEY_ENV).filter(|v| !v.is_empty()) {
        config.provider_api_key = key;
    }
    if let Some(secret) = lookup(TOKEN_SECRET_ENV).filter(|v| !v.is_empty()) {
        config.token_secret = secret;
    }
}
