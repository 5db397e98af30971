//! lounge-server: backend for live rooms.
//!
//! Creates rooms through the conferencing provider and signs join tokens
//! for the room client.

use std::path::PathBuf;

use clap::Parser;
use lounge_common::{LoungeError, Result};
use lounge_config::{config_to_json, toml_loader, validation, LoungeConfig};
use tokio::net::TcpListener;

use lounge_server::{apply_env_overrides, build_router, AppState};

#[derive(Parser)]
#[command(name = "lounge-server", about = "Room creation and join tokens for live rooms")]
struct Args {
    /// Config file (defaults to the platform config directory).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on, overriding `server.port`.
    #[arg(short, long)]
    port: Option<u16>,

    /// Print the effective config as JSON and exit.
    #[arg(long)]
    print_config: bool,
}

fn load(path: Option<&PathBuf>) -> Result<LoungeConfig> {
    let config = match path {
        Some(path) => toml_loader::load_from_path(path)?,
        None => toml_loader::load_default()?,
    };
    validation::validate(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = load(args.config.as_ref())?;
    apply_env_overrides(&mut config.server, |name| std::env::var(name).ok());
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let level = config.logging.level.as_directive();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("lounge_server={level},lounge_config={level}").into()),
        )
        .init();

    if args.print_config {
        println!("{}", config_to_json(&config));
        return Ok(());
    }

    if config.server.provider_api_key.is_empty() {
        tracing::warn!("No provider API key configured; room creation will fail");
    }
    if config.server.token_secret.is_empty() {
        tracing::warn!("No token secret configured; token generation will fail");
    }

    let addr = format!("0.0.0.0:{}", config.server.port);
    let state = AppState::new(config.server, config.token.ttl_secs)
        .map_err(|e| LoungeError::Network(e.to_string()))?;
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("lounge-server listening on {}", addr);

    axum::serve(listener, build_router(state)).await?;
    Ok(())
}
