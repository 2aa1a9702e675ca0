//! Application state for Axum handlers.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use crate::config::AppConfig;
use crate::service::{
    AdmissionService, CompetitionService, ImageService, ResultService, RollNumberAllocator,
};
use crate::storage::traits::Storage;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Storage backend.
    pub storage: Arc<dyn Storage>,
    /// Competition application service.
    pub competition_service: Arc<CompetitionService>,
    /// Admission service.
    pub admission_service: Arc<AdmissionService>,
    /// Exam result service.
    pub result_service: Arc<ResultService>,
    /// Image upload service.
    pub image_service: Arc<ImageService>,
    /// Prometheus recorder handle, when metrics are enabled.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(config: Arc<AppConfig>, storage: Arc<dyn Storage>) -> Self {
        let allocator = Arc::new(RollNumberAllocator::new(
            Arc::clone(&storage),
            config.allocation.max_attempts,
        ));

        let competition_service = Arc::new(CompetitionService::new(
            Arc::clone(&storage),
            Arc::clone(&allocator),
            config.allocation.competition.clone(),
            config.competition.clone(),
        ));

        let admission_service = Arc::new(AdmissionService::new(
            Arc::clone(&storage),
            allocator,
            config.allocation.admission.clone(),
        ));

        let result_service = Arc::new(ResultService::new(
            Arc::clone(&storage),
            config.results.clone(),
        ));

        let image_service = Arc::new(ImageService::new(
            Arc::clone(&storage),
            config.uploads.clone(),
        ));

        Self {
            config,
            storage,
            competition_service,
            admission_service,
            result_service,
            image_service,
            metrics: None,
        }
    }

    /// Attach the Prometheus handle `/metrics` renders.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
