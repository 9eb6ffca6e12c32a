//! URL 后端入口

use std::path::Path;
use std::sync::Arc;

use docchat::config::{is_default_api_key, Config};
use docchat::database::open_database;
use docchat::providers::ExtractiveResponder;
use docchat::server::{run_server, AppState};
use docchat::services::ChatService;
use docchat::SourceType;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = Config::load();
    if is_default_api_key(&config.api_key) {
        tracing::warn!("[Main] Using the default API key; set API_KEY before exposing this service");
    }

    let kind = SourceType::Url;
    let db = open_database(Path::new(config.database_path(kind)), kind)
        .map_err(|e| anyhow::anyhow!("failed to open database: {}", e))?;
    let service = ChatService::new(db, kind);
    let state = AppState::new(
        &config.api_key,
        service,
        Arc::new(ExtractiveResponder::default()),
    );

    run_server(state, &config.server.host, config.port(kind))
        .await
        .map_err(|e| anyhow::anyhow!("server error: {}", e))
}
