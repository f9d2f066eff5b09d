/// Shared application state passed to axum handlers.
use std::sync::Arc;

use flowboard_core::events::BoardChangeEvent;
use flowboard_core::projects::ProjectService;
use flowboard_core::reconcile::ReconciliationService;
use flowboard_core::storage::BoardStorage;
use tokio::sync::broadcast;

use crate::ai::TextGenerator;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn BoardStorage>,
    pub projects: ProjectService,
    pub tasks: ReconciliationService,
    pub ai: Arc<dyn TextGenerator>,
    pub event_tx: broadcast::Sender<BoardChangeEvent>,
    pub bind_address: String,
    pub port: u16,
    /// Requests per second allowed on the AI routes.
    pub ai_rate_limit: usize,
}

impl AppState {
    pub fn new(storage: Arc<dyn BoardStorage>, ai: Arc<dyn TextGenerator>) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            projects: ProjectService::new(storage.clone()),
            tasks: ReconciliationService::new(storage.clone()),
            storage,
            ai,
            event_tx,
            bind_address: "127.0.0.1".to_string(),
            port: 0,
            ai_rate_limit: 5,
        }
    }

    /// Notify SSE subscribers. Having no subscribers is fine.
    pub fn publish(&self, event: BoardChangeEvent) {
        let _ = self.event_tx.send(event);
    }
}
