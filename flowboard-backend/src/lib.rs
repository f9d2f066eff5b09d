//! FlowBoard backend: config loading, storage init, AI client, HTTP server.
pub mod ai;
pub mod api;
pub mod config;
pub mod logging;
pub mod server;
pub mod state;

use std::path::PathBuf;
use std::sync::Arc;

use flowboard_core::storage::local::LocalStorage;
use flowboard_core::storage::{BoardStorage, StorageError};

use crate::ai::{AiError, GeminiClient};
use crate::config::ServerConfig;
use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("AI client error: {0}")]
    Ai(#[from] AiError),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage and AI client wired together as described by `config`.
pub fn build_state(config: &ServerConfig) -> Result<AppState, BackendError> {
    let storage: Arc<dyn BoardStorage> = match &config.data_file {
        Some(path) => {
            let local = LocalStorage::open(&PathBuf::from(path))?;
            if let Some(file) = local.data_file() {
                log::info!(target: "flowboard.storage", "Board data file: {}", file.display());
            }
            Arc::new(local)
        }
        None => {
            log::warn!(
                target: "flowboard.storage",
                "No dataFile configured, projects live in memory only"
            );
            Arc::new(LocalStorage::new())
        }
    };

    let gemini = GeminiClient::new(&config.ai)?;
    if !gemini.is_configured() {
        log::warn!(
            target: "flowboard.ai",
            "No Gemini API key configured, AI routes will answer 502"
        );
    }

    let mut state = AppState::new(storage, Arc::new(gemini));
    state.bind_address = config.bind_address.clone();
    state.port = config.port;
    state.ai_rate_limit = config.ai.max_requests_per_second;
    Ok(state)
}

/// Load config, start logging and serve until Ctrl-C.
pub async fn run() -> Result<(), BackendError> {
    let config_path = config::default_config_path();
    let (config, config_notice) = config::load_config(&config_path);
    let config = config.with_env_overrides();

    let filter = config.log_level.clone().unwrap_or_else(|| "info".to_string());
    if let Err(e) = logging::init(&filter) {
        eprintln!("failed to initialize backend logger: {}", e);
    }
    log::info!(target: "flowboard.config", "{}", config_notice);

    let state = build_state(&config)?;
    let addr = server::spawn_server(state).await?;
    log::info!(target: "flowboard.server", "FlowBoard backend ready on http://{}/api", addr);

    tokio::signal::ctrl_c().await?;
    log::info!(target: "flowboard.server", "Shutting down");
    Ok(())
}
