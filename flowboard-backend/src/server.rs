/// HTTP server: builds the router and runs axum on a background tokio task.
use std::net::SocketAddr;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::api::api_router;
use crate::state::AppState;
use crate::BackendError;

/// Full application: `/api` routes, open CORS, shared state.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api", api_router(state.ai_rate_limit))
        .layer(cors)
        .with_state(state)
}

/// Bind `state.bind_address:state.port` (port 0 picks a free one) and serve
/// in the background. Returns the bound address.
pub async fn spawn_server(mut state: AppState) -> Result<SocketAddr, BackendError> {
    let listener =
        tokio::net::TcpListener::bind((state.bind_address.as_str(), state.port)).await?;
    let addr = listener.local_addr()?;
    state.port = addr.port();

    let app = build_router(state);
    log::info!(target: "flowboard.server", "HTTP server listening on http://{}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            log::error!(target: "flowboard.server", "HTTP server exited with error: {}", e);
        }
    });

    Ok(addr)
}
