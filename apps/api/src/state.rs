use std::sync::Arc;

use crate::llm_client::PlanModel;
use crate::planning::export::FileExporter;
use crate::planning::generator::PlanGenerator;
use crate::store::PlannerStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PlannerStore>,
    /// Model behind plan generation. Production: `LlmClient`.
    pub model: Arc<dyn PlanModel>,
    pub exporter: FileExporter,
}

impl AppState {
    pub fn new(
        store: Arc<dyn PlannerStore>,
        model: Arc<dyn PlanModel>,
        exporter: FileExporter,
    ) -> Self {
        Self {
            store,
            model,
            exporter,
        }
    }

    pub fn generator(&self) -> PlanGenerator {
        PlanGenerator::new(self.store.clone(), self.model.clone(), self.exporter.clone())
    }
}
