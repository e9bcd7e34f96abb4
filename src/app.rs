//! Application state and service initialization
//!
//! This module centralizes collaborator construction and dependency
//! injection, making it easier to manage the application lifecycle.

use std::sync::Arc;

use crate::classify::VisionClassifier;
use crate::model::Config;
use crate::pipeline::ReportPipeline;
use crate::resolver::{BrightDataSearch, FormResolver, NominatimResolver};
use crate::submit::AutomationRegistry;

/// Fatal startup errors. Anything here means the process cannot serve
/// traffic and should exit.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Upload directory error: {0}")]
    UploadDir(std::io::Error),
}

/// Application state containing all services and shared resources
pub struct AppState {
    pub config: Config,
    pub pipeline: ReportPipeline,
}

impl AppState {
    /// Initialize all collaborators and build application state
    ///
    /// Requires `GROQ_API_KEY` and `BRIGHTDATA_API_KEY`; everything else has
    /// defaults.
    pub fn new(config: Config) -> Result<Self, AppError> {
        std::fs::create_dir_all(&config.upload_dir).map_err(AppError::UploadDir)?;

        let classifier = VisionClassifier::from_env()
            .map_err(|e| AppError::Configuration(e.to_string()))?;

        let search = BrightDataSearch::from_env(config.search.clone())
            .map_err(|e| AppError::Configuration(e.to_string()))?;

        let resolver = FormResolver::new(Arc::new(NominatimResolver::new()), Arc::new(search));
        let registry = Arc::new(AutomationRegistry::from_config(&config.adapter));

        let pipeline = ReportPipeline::new(
            Arc::new(classifier),
            resolver,
            registry,
            config.confidence_threshold,
        );

        tracing::info!(
            upload_dir = %config.upload_dir.display(),
            scripts_dir = %config.adapter.scripts_dir.display(),
            confidence_threshold = config.confidence_threshold,
            "application state initialized"
        );

        Ok(Self { config, pipeline })
    }
}
