use std::sync::Arc;

use crate::screening::orchestrator::BatchOrchestrator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Owns every pipeline collaborator (extractors, evaluator, object store,
    /// record store, failure log).
    pub orchestrator: Arc<BatchOrchestrator>,
}
