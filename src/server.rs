//! Shared application state handed to every request handler.

use crate::completion::CompletionClient;
use crate::config::Config;
use crate::database::Database;
use crate::pipeline::NaturalLanguageQueryService;
use crate::shutdown::{SharedShutdownController, ShutdownController};
use std::sync::Arc;

/// State shared by all handlers.
///
/// Cloned for each request; everything inside is behind an `Arc`. The
/// database handle (and the pool it owns) lives here, never in the pipeline.
#[derive(Clone)]
pub struct AppState {
    /// Configuration.
    pub config: Arc<Config>,

    /// Database handle.
    pub database: Arc<dyn Database>,

    /// Natural-language query pipeline.
    pub pipeline: Arc<NaturalLanguageQueryService>,

    /// Shutdown state, reported by `/health`.
    pub shutdown: SharedShutdownController,
}

impl AppState {
    /// Assemble state from configuration and its collaborators.
    pub fn new(
        config: Config,
        database: Arc<dyn Database>,
        completion: Arc<dyn CompletionClient>,
    ) -> Self {
        let pipeline = NaturalLanguageQueryService::new(completion, &config.query);

        Self {
            config: Arc::new(config),
            database,
            pipeline: Arc::new(pipeline),
            shutdown: Arc::new(ShutdownController::new()),
        }
    }

    /// Use the process-wide shutdown controller.
    pub fn with_shutdown(mut self, shutdown: SharedShutdownController) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Database names callers may query.
    pub fn databases(&self) -> &[String] {
        &self.config.query.databases
    }
}
